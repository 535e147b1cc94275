//! Compiles the KubeVirt hook protocol definitions.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Fall back to the bundled protoc so builds do not need one on PATH.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_build::configure().compile_protos(
        &[
            "proto/info/api.proto",
            "proto/v1alpha1/api.proto",
            "proto/v1alpha2/api.proto",
        ],
        &["proto"],
    )?;

    Ok(())
}
