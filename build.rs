use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-env-changed=HAZPTR_DEFAULT_HAZARD_POINTERS");

    let out_dir = env::var("OUT_DIR").expect("no out directory");
    let dest = Path::new(&out_dir).join("build_constants.rs");

    let mut file = File::create(&dest).expect("could not create file");

    let count: usize = option_env!("HAZPTR_DEFAULT_HAZARD_POINTERS")
        .map_or(Ok(8), str::parse)
        .expect("failed to parse env variable HAZPTR_DEFAULT_HAZARD_POINTERS");

    if count == 0 {
        panic!("invalid HAZPTR_DEFAULT_HAZARD_POINTERS value (0)");
    }

    write!(&mut file, "const DEFAULT_HAZARD_POINTERS: usize = {};", count)
        .expect("could not write to file");
}
