//! Client-side conversation state.
//!
//! [`ConversationStore`] owns the transcript and status for one session and
//! reaches the backend only through the proxy, via a [`ProxyApi`].

pub mod client;
pub mod store;

pub use client::{HttpProxyClient, ProxyApi};
pub use store::{
    ConversationStore, ENDPOINT_FAILURE_REPLY, SendOutcome, StoreEvent, TRANSPORT_FAILURE_REPLY,
};
