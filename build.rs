fn main() {
    println!("cargo:rerun-if-changed=certs/plantops_ca.pem");

    // Host builds (tests, fuzzing) run without the ESP-IDF toolchain.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
