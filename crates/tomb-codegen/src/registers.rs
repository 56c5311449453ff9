//! The VM register bank.
//!
//! The target VM exposes a fixed bank of registers per call frame. The pool
//! tracks which are free, remembers an alias string per live register (used
//! in emitted assembly comments), and asserts that a method releases
//! everything it acquired.

use std::fmt;
use tomb_ast::{CompileResult, CompilerError, Phase, Span};

/// Size of the VM register bank.
pub const REGISTER_COUNT: usize = 32;

/// A VM register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegId(u8);

impl RegId {
    pub fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Free-list allocator over the register bank.
///
/// Registers are handed out lowest-index-first so output is deterministic.
#[derive(Debug)]
pub struct RegisterPool {
    aliases: [Option<String>; REGISTER_COUNT],
}

impl Default for RegisterPool {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterPool {
    pub fn new() -> Self {
        Self {
            aliases: std::array::from_fn(|_| None),
        }
    }

    /// Acquire the lowest free register.
    ///
    /// The hint becomes the register's alias in emitted comments. Running
    /// out of the bank is a fatal compile error.
    pub fn alloc(&mut self, hint: &str, span: Span) -> CompileResult<RegId> {
        for (index, slot) in self.aliases.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(hint.to_string());
                return Ok(RegId(index as u8));
            }
        }
        Err(CompilerError::new(
            Phase::CodeGen,
            span,
            format!("register pressure exceeded: all {REGISTER_COUNT} registers are live"),
        ))
    }

    /// Release a register back to the pool.
    ///
    /// # Panics
    ///
    /// Panics on double release; that is a compiler bug, not a user error.
    pub fn release(&mut self, reg: RegId) {
        let slot = &mut self.aliases[reg.0 as usize];
        assert!(slot.is_some(), "BUG: double release of {reg}");
        *slot = None;
    }

    /// Run `body` with a scratch register, releasing it on every path.
    pub fn with<T>(
        &mut self,
        hint: &str,
        span: Span,
        body: impl FnOnce(&mut Self, RegId) -> CompileResult<T>,
    ) -> CompileResult<T> {
        let reg = self.alloc(hint, span)?;
        let result = body(self, reg);
        self.release(reg);
        result
    }

    /// Number of currently live registers.
    pub fn live(&self) -> usize {
        self.aliases.iter().filter(|slot| slot.is_some()).count()
    }

    /// Assert every register was released.
    ///
    /// # Panics
    ///
    /// Panics with the leaked aliases if any register is still live.
    pub fn assert_clean(&self) {
        let leaked: Vec<&str> = self
            .aliases
            .iter()
            .filter_map(|slot| slot.as_deref())
            .collect();
        assert!(
            leaked.is_empty(),
            "BUG: registers leaked at method exit: {leaked:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_lowest_first() {
        let mut pool = RegisterPool::new();
        let a = pool.alloc("a", Span::zero()).unwrap();
        let b = pool.alloc("b", Span::zero()).unwrap();
        assert_eq!(a.to_string(), "r0");
        assert_eq!(b.to_string(), "r1");
        pool.release(a);
        let c = pool.alloc("c", Span::zero()).unwrap();
        assert_eq!(c.to_string(), "r0");
    }

    #[test]
    fn test_exhaustion() {
        let mut pool = RegisterPool::new();
        for i in 0..REGISTER_COUNT {
            pool.alloc(&format!("t{i}"), Span::zero()).unwrap();
        }
        let err = pool.alloc("overflow", Span::zero()).unwrap_err();
        assert!(err.message.contains("register pressure exceeded"));
    }

    #[test]
    fn test_with_releases_on_both_paths() {
        let mut pool = RegisterPool::new();
        pool.with("scratch", Span::zero(), |pool, reg| {
            assert_eq!(pool.live(), 1);
            assert_eq!(reg.to_string(), "r0");
            Ok(())
        })
        .unwrap();
        assert_eq!(pool.live(), 0);

        let err: tomb_ast::CompileResult<()> = pool.with("scratch", Span::zero(), |_, _| {
            Err(tomb_ast::CompilerError::at(
                tomb_ast::Phase::CodeGen,
                1,
                0,
                "boom",
            ))
        });
        assert!(err.is_err());
        assert_eq!(pool.live(), 0);
        pool.assert_clean();
    }

    #[test]
    #[should_panic(expected = "leaked")]
    fn test_leak_assertion() {
        let mut pool = RegisterPool::new();
        pool.alloc("stray", Span::zero()).unwrap();
        pool.assert_clean();
    }
}
