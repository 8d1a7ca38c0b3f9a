//! Entry point for the `wdt` binary.
//!
//! All behaviour lives in [`wdt_cli`]; this file only wires up the global
//! allocator and translates the process exit code.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    std::process::exit(wdt_cli::run(std::env::args_os()));
}
