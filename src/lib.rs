#![deny(
    // The following are allowed by default lints according to
    // https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html
    absolute_paths_not_starting_with_crate,
    explicit_outlives_requirements,
    macro_use_extern_crate,
    redundant_lifetimes,
    anonymous_parameters,
    bare_trait_objects,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unstable_features,
    unused_lifetimes,
    unused_macro_rules,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    variant_size_differences,

    warnings, // treat all wanings as errors

    clippy::all,
    clippy::pedantic,
    clippy::cargo,
)]
#![allow(
    // Some explicitly allowed Clippy lints, must have clear reason to allow
    clippy::blanket_clippy_restriction_lints, // allow clippy::restriction
    clippy::implicit_return, // actually omitting the return keyword is idiomatic Rust code
    clippy::module_name_repetitions, // repeation of module name in a struct name is not big deal
    clippy::multiple_crate_versions, // multi-version dependency crates is not able to fix
    clippy::cargo_common_metadata, // not published yet, no repository to link
    clippy::missing_panics_doc, // fatal substrate failures abort the process, they never panic
)]
//! Manual-reset and auto-reset events in the Win32 style, built on
//! [`std::sync::Mutex`]/[`std::sync::Condvar`] pairs, plus
//! [`wait_multiple`] for blocking on any or all of a set of events.
//!
//! # Examples
//!
//! ```
//! use reset_events::{wait_multiple, Event, ResetMode};
//!
//! static READY: Event = Event::new(ResetMode::Manual, false);
//!
//! let worker = std::thread::spawn(|| READY.signal());
//! READY.wait(None)?;
//! worker.join().expect("join failed");
//!
//! let flags = [
//!     Event::new(ResetMode::Auto, true),
//!     Event::new(ResetMode::Auto, false),
//! ];
//! assert_eq!(Some(0), wait_multiple(&[&flags[0], &flags[1]], false, None)?);
//! // the winning auto-reset event was consumed
//! assert!(!flags[0].try_wait());
//! # Ok::<(), std::io::Error>(())
//! ```

/// Shared synchronization plumbing.
pub(crate) mod common;

/// Event abstraction and impl.
pub mod event;

/// Waiting on many events at once.
pub mod multi_wait;

pub use event::{Event, ResetMode};
pub use multi_wait::wait_multiple;
