#![macro_use]

/// Defines a global function written in assembly.
///
/// The body is a list of string literals, one per instruction, each ending in
/// a newline. Functions defined using this macro are declared on the Rust side
/// using an `extern "C"` block.
///
/// # Examples
///
///     asm_func!(
///         "stacklet_example",
///         "ret\n",
///     );
#[cfg(target_vendor = "apple")]
macro_rules! asm_func {
    ($name: expr, $($body: expr),+ $(,)?) => {
        std::arch::global_asm!(concat!(
            ".text\n",
            ".p2align 4\n",
            ".global _", $name, "\n",
            "_", $name, ":\n",
            $($body,)+
        ));
    }
}

#[cfg(not(target_vendor = "apple"))]
macro_rules! asm_func {
    ($name: expr, $($body: expr),+ $(,)?) => {
        std::arch::global_asm!(concat!(
            ".text\n",
            ".p2align 4\n",
            ".global ", $name, "\n",
            ".type ", $name, ", %function\n",
            $name, ":\n",
            $($body,)+
            ".size ", $name, ", . - ", $name, "\n",
        ));
    }
}
