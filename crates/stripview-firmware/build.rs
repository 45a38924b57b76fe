use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=sdkconfig.defaults");

    if env::var("ESP_IDF_SDKCONFIG_DEFAULTS").is_err() {
        println!(
            "cargo:warning=ESP_IDF_SDKCONFIG_DEFAULTS not set; export it as \
             crates/stripview-firmware/sdkconfig.defaults or task stacks stay at IDF defaults"
        );
    }

    // A cached sdkconfig older than the defaults file would silently win
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        let defaults = PathBuf::from(&manifest_dir).join("sdkconfig.defaults");
        invalidate_stale_sdkconfig(&PathBuf::from(&manifest_dir).join("target"), &defaults);
    }

    embuild::espidf::sysenv::output();
}

fn modified(path: &Path) -> Option<std::time::SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn invalidate_stale_sdkconfig(target_dir: &Path, defaults: &Path) {
    let Some(defaults_time) = modified(defaults) else {
        return;
    };
    let Ok(profiles) = fs::read_dir(target_dir) else {
        return;
    };
    for profile in profiles.flatten() {
        let Ok(builds) = fs::read_dir(profile.path().join("build")) else {
            continue;
        };
        for build in builds.flatten() {
            let build_path = build.path();
            if !build_path.to_string_lossy().contains("esp-idf-sys") {
                continue;
            }
            let sdkconfig = build_path.join("out/esp-idf/sdkconfig");
            if modified(&sdkconfig).is_some_and(|t| defaults_time > t) {
                println!("cargo:warning=sdkconfig.defaults changed, regenerating sdkconfig");
                let _ = fs::remove_file(&sdkconfig);
                let _ = fs::remove_dir_all(build_path.join("out/esp-idf/sdkconfig.d"));
            }
        }
    }
}
