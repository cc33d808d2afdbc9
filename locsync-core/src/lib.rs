#![doc = "locsync-core: file transfer engine for the locsync localization client."]

//! Everything between the command line and the remote workspace lives here:
//! the workspace cache, push candidate filtering, path templating, the
//! bounded transfer pool and the remote file/segment services.
//!
//! # Usage
//! The `locsync` binary builds a [`config::Config`], a [`rest::RestClient`]
//! and a [`session::Session`], then drives [`push::Pusher`],
//! [`download::Downloader`] or the services in [`files`] and [`segments`].

pub mod config;
pub mod contract;
pub mod download;
pub mod error;
pub mod files;
pub mod filter;
pub mod local;
pub mod pool;
pub mod push;
pub mod rest;
pub mod segments;
pub mod session;
pub mod status;
pub mod template;
pub mod workspace;
