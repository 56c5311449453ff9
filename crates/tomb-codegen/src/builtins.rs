//! Canned assembly snippets for builtin-strategy library methods.
//!
//! Snippets follow the local-call convention: arguments arrive on the VM
//! stack (first argument on top), the result is pushed before `RET`. Each
//! snippet runs in its own call frame, so its low registers cannot clobber
//! the caller's. Internal labels are fixed names; snippets are emitted at
//! most once per script, so they never collide.

/// Look up the assembly text of a builtin snippet.
pub fn snippet(key: &str) -> Option<&'static str> {
    match key {
        "math_abs" => Some(
            "@builtin_math_abs:\n\
             \x20   POP r0\n\
             \x20   LOAD r1 0\n\
             \x20   GTE r0 r1 r2\n\
             \x20   JMPIF r2 @builtin_math_abs_done\n\
             \x20   NEG r0 r0\n\
             @builtin_math_abs_done:\n\
             \x20   PUSH r0\n\
             \x20   RET\n",
        ),
        "math_min" => Some(
            "@builtin_math_min:\n\
             \x20   POP r0\n\
             \x20   POP r1\n\
             \x20   LTE r0 r1 r2\n\
             \x20   JMPIF r2 @builtin_math_min_left\n\
             \x20   PUSH r1\n\
             \x20   RET\n\
             @builtin_math_min_left:\n\
             \x20   PUSH r0\n\
             \x20   RET\n",
        ),
        "math_max" => Some(
            "@builtin_math_max:\n\
             \x20   POP r0\n\
             \x20   POP r1\n\
             \x20   GTE r0 r1 r2\n\
             \x20   JMPIF r2 @builtin_math_max_left\n\
             \x20   PUSH r1\n\
             \x20   RET\n\
             @builtin_math_max_left:\n\
             \x20   PUSH r0\n\
             \x20   RET\n",
        ),
        _ => None,
    }
}

/// The call label of a builtin snippet.
pub fn entry_label(key: &str) -> String {
    format!("@builtin_{key}")
}
