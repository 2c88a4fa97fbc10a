//! # Taskwave (account registration and sign-in)
//!
//! `taskwave` wires the sign-in page of the Taskwave product to a hosted
//! authentication/database backend. The backend owns password hashing,
//! sessions and persistence; this crate owns the workflows around it.
//!
//! ## Workflows
//!
//! - **Signup:** validate, re-check username uniqueness, create the
//!   credential, read the referral bonus, write the profile, then credit the
//!   referrer. Only the bonus read and the referrer credit are allowed to fail
//!   without aborting the registration.
//! - **Signin:** validate, verify the credential, persist or clear the
//!   remembered email. Wrong email and wrong password are reported with the
//!   same message.
//! - **Password reset:** validate the email shape and ask the backend to send
//!   a reset link.
//!
//! ## Backend
//!
//! The backend is reached through the [`directory::AccountDirectory`] port.
//! [`directory::firebase`] talks to the hosted REST APIs;
//! [`directory::memory`] keeps everything in process for tests and local
//! development.

pub mod cli;
pub mod directory;
pub mod page;
pub mod preferences;
pub mod present;
pub mod taskwave;
pub mod validator;
pub mod workflow;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
