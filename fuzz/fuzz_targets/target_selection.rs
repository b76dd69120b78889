#![no_main]
use libfuzzer_sys::fuzz_target;
use modcat::module::registry::targets::{HostRuntime, PlatformTarget};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let candidates: Vec<PlatformTarget> = text.split('/').filter_map(PlatformTarget::parse).collect();

    let host = HostRuntime::new("host", (2, 1), &["portable".to_string(), "any".to_string()]);
    let forward = host.select_best(&candidates).map(|t| t.folder.clone());

    // Selection must not depend on enumeration order
    let mut reversed = candidates.clone();
    reversed.reverse();
    let backward = host.select_best(&reversed).map(|t| t.folder.clone());
    assert_eq!(forward, backward);

    if let Some(folder) = forward {
        let chosen = PlatformTarget::parse(&folder).expect("selected target parses");
        assert!(host.rank(&chosen).is_some());
    }
});
