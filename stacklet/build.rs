use std::env;

// The ARM and RISC-V target features we care about (VFP, ARMv5TE and the D
// extension) aren't reported through `cfg(target_feature)` on stable
// compilers, so we derive them from the target here.
fn main() {
    let target = env::var("TARGET").unwrap();
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap();
    let os = env::var("CARGO_CFG_TARGET_OS").unwrap();
    let features = env::var("CARGO_CFG_TARGET_FEATURE").unwrap_or_default();
    let features: Vec<&str> = features.split(',').collect();

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-check-cfg=cfg(stacklet_armv4)");
    println!("cargo:rustc-check-cfg=cfg(stacklet_vfp)");
    println!("cargo:rustc-check-cfg=cfg(stacklet_float_d)");

    match arch.as_str() {
        "arm" => {
            // ARMv4T lacks `blx`, so calls through a register use the
            // `mov lr, pc` and `bx` pair instead.
            if target.starts_with("armv4") {
                println!("cargo:rustc-cfg=stacklet_armv4");
            }

            let vfp = features
                .iter()
                .any(|f| matches!(*f, "vfp2" | "vfp3" | "vfp4" | "neon" | "d32"))
                || target.ends_with("hf")
                || (os == "android" && target.contains("v7"));

            if vfp {
                println!("cargo:rustc-cfg=stacklet_vfp");
            }
        }
        "riscv64" => {
            let double = features.contains(&"d")
                || target.starts_with("riscv64gc")
                || target.starts_with("riscv64g-");

            if double {
                println!("cargo:rustc-cfg=stacklet_float_d");
            }
        }
        _ => {}
    }
}
