fn main() {
    // GIT_COMMIT_HASH and friends for the health endpoint
    if let Err(e) = built::write_built_file() {
        println!("cargo:warning=failed to acquire build-time information: {e}");
    }
}
