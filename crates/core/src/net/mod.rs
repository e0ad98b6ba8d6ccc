//! HTTP plumbing shared by every component that talks to an upstream site.
//!
//! The engine favors scraping resilience over connection reuse: by default a
//! brand new session (fresh cookie jar, new randomized User-Agent) is built
//! for every call, and transient failures are retried a bounded number of
//! times with a fresh identity per attempt.

mod client;
mod context;

pub use client::{HttpClient, HttpPolicy, NetError, SessionMode};
pub use context::RequestContext;
