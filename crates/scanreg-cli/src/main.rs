use std::{error::Error, fs, path::Path};

use clap::Parser;
use log::info;
use scanreg_pipeline::{CalibrationRecord, FeaturedSession, RegistrationConfig, RegistrationPipeline};

/// Register the side scans of a session onto its center scan.
#[derive(Debug, Parser)]
#[command(author, version, about = "Point-cloud registration for scan sessions")]
struct Args {
    /// Path to JSON file containing a FeaturedSession.
    #[arg(long)]
    session: String,

    /// Optional path to JSON RegistrationConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<String>,

    /// Optional path the calibration record is written to.
    #[arg(long)]
    output: Option<String>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

fn run_session_from_files(
    session_path: &str,
    config_path: Option<&str>,
) -> Result<CalibrationRecord, Box<dyn Error>> {
    let featured: FeaturedSession = load_json_file(Path::new(session_path))?;

    let config = if let Some(cfg_path) = config_path {
        load_json_file::<RegistrationConfig>(Path::new(cfg_path))?
    } else {
        RegistrationConfig::default()
    };

    let (session, provider) = featured.into_parts();
    let pipeline = RegistrationPipeline::new(config)?;
    Ok(pipeline.register_session(&session, &provider)?)
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();
    let record = run_session_from_files(&args.session, args.config.as_deref())?;
    if let Some(output) = &args.output {
        record.save(Path::new(output))?;
        info!("calibration record written to {output}");
    }
    println!("{}", record.to_json()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;
    use scanreg_core::synthetic::OverlapSceneSpec;
    use scanreg_core::{RigidTransform, Vec3};
    use scanreg_pipeline::{FeaturedCloud, ScanSource};
    use tempfile::NamedTempFile;

    fn write_json<T: serde::Serialize>(value: &T, path: &Path) {
        serde_json::to_writer_pretty(fs::File::create(path).unwrap(), value).unwrap();
    }

    fn synthetic_session() -> (FeaturedSession, RigidTransform) {
        let gt = RigidTransform::from_rotation(
            &Rotation3::from_axis_angle(&Vec3::z_axis(), 0.3),
            Vec3::new(0.4, 0.1, -0.2),
        );
        let scene = OverlapSceneSpec {
            seed: 5,
            ..OverlapSceneSpec::default()
        }
        .build(&gt);
        let session = FeaturedSession {
            scan_id: "scan_0003".to_string(),
            center: FeaturedCloud {
                cloud: scene.target,
                features: scene.target_features,
            },
            up: Some(FeaturedCloud {
                cloud: scene.source,
                features: scene.source_features,
            }),
            down: None,
        };
        (session, gt)
    }

    #[test]
    fn helper_smoke_test() {
        let (session, gt) = synthetic_session();
        let session_file = NamedTempFile::new().unwrap();
        let config_file = NamedTempFile::new().unwrap();

        write_json(&session, session_file.path());
        let config = RegistrationConfig {
            voxel_size: 0.1,
            seed: 3,
            ..RegistrationConfig::default()
        };
        write_json(&config, config_file.path());

        let record = run_session_from_files(
            session_file.path().to_str().unwrap(),
            Some(config_file.path().to_str().unwrap()),
        )
        .expect("cli helper should succeed");

        assert_eq!(record.scan_id, "scan_0003");
        let up = record.get(ScanSource::Up).unwrap().unwrap();
        assert!(up.rotation_angle_to(&gt) < 1e-2);
        assert!(up.translation_distance_to(&gt) < 1e-2);
        assert_eq!(record.get(ScanSource::Down).unwrap(), None);
    }

    #[test]
    fn missing_session_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(run_session_from_files(path.to_str().unwrap(), None).is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (session, _) = synthetic_session();
        let session_file = NamedTempFile::new().unwrap();
        let config_file = NamedTempFile::new().unwrap();
        write_json(&session, session_file.path());
        fs::write(config_file.path(), r#"{ "voxel_size": 0.0 }"#).unwrap();

        let err = run_session_from_files(
            session_file.path().to_str().unwrap(),
            Some(config_file.path().to_str().unwrap()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("voxel"), "unexpected error: {err}");
    }
}
