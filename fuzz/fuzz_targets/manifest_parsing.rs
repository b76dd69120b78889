#![no_main]
use libfuzzer_sys::fuzz_target;
use modcat::module::metadata::{is_async_return_type, is_synthetic_name};
use modcat::module::registry::manifest::ArtifactManifest;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Parsing must never panic; accepted manifests must render and re-parse
    if let Ok(manifest) = ArtifactManifest::from_toml_str(text) {
        let rendered = manifest.to_toml_string().expect("valid manifest renders");
        let reparsed = ArtifactManifest::from_toml_str(&rendered).expect("rendered manifest parses");
        assert_eq!(reparsed, manifest);

        for ty in &manifest.types {
            let _ = is_synthetic_name(&ty.name);
            for member in &ty.members {
                let _ = is_async_return_type(&member.returns);
            }
        }
    }
});
