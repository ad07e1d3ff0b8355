// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("apkgbuild")
        .version(env!("CARGO_PKG_VERSION"))
        .author("apkgbuild Contributors")
        .about("APKG Build Tool")
        .arg(
            Arg::new("script")
                .required(true)
                .value_name("SCRIPT")
                .help("Path to the Lua build script"),
        )
        .arg(
            Arg::new("output")
                .required(true)
                .value_name("OUTPUT")
                .help("Path of the output package archive (tar+zstd)"),
        )
        .arg(
            Arg::new("no_isolation")
                .long("no-isolation")
                .num_args(0)
                .help("Run the build without chroot isolation (for unprivileged use)"),
        )
}

fn main() -> std::io::Result<()> {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir)?;

    let man = Man::new(build_cli());
    let mut buffer: Vec<u8> = Vec::new();
    man.render(&mut buffer)?;
    fs::write(man_dir.join("apkgbuild.1"), buffer)?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
