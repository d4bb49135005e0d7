//! Demonstration `Service` implementations, standing in for the
//! embedded scripting engine an external collaborator would normally use
//! to implement user-written services, just enough to prove the plug-in
//! contract end to end.

mod echo;
mod ping;

use actor_core::Router;

pub use echo::Echo;
pub use ping::Ping;

/// Registers every demo service type with the router's factory table.
/// Called once during boot, before any `new_service` calls are submitted.
pub fn register_all(router: &Router) {
    router.register_service("echo", || Box::new(Echo));
    router.register_service("ping", || Box::new(Ping::default()));
}
