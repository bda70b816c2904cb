fn main() {
    println!("cargo:rerun-if-changed=sdkconfig.defaults");

    // Host builds (library + tests) skip the ESP-IDF environment entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
