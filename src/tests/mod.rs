//! Cross-module tests.
//!
//! `enforce` drives the full resolve → list → plan → delete pipeline against
//! the in-memory store; `kube_store` runs the Kubernetes backend against a
//! wiremock API server.
