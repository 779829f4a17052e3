// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod project;
pub mod state;
pub mod timeline;
pub mod verify;
