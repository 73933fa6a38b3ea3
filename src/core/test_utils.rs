//! Test utilities for arena-based testing.
//!
//! Each test gets its own bounded arena, the same way an embedding driver
//! gives every kernel emission its own session.

#[cfg(test)]
pub mod test {
    use super::super::session::EmitSession;
    use bumpalo::Bump;

    /// Test context that manages arena lifetime for tests.
    pub struct TestContext {
        arena: Bump,
    }

    impl TestContext {
        pub fn new() -> Self {
            Self { arena: Bump::new() }
        }

        /// Create a session borrowing this context's arena.
        pub fn create_session(&self) -> EmitSession<'_> {
            EmitSession::new(&self.arena)
        }

        /// Bytes handed out by the arena so far.
        pub fn memory_used(&self) -> usize {
            self.arena.allocated_bytes()
        }
    }

    impl Default for TestContext {
        fn default() -> Self {
            Self::new()
        }
    }
}
