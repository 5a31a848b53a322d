use std::fs::File;
use std::process::ExitCode;
use std::sync::Arc;

use log::debug;

use rips_rs::barcode::{barcode, write_barcode_csv};
use rips_rs::point_cloud::PointCloud;
use rips_rs::rips_complex::RipsComplex;
use rips_rs::MAX_DIM;

const SEPARATOR: &str = ",";

const USAGE: &str = "usage: rips_rs <points-file> [barcode <eps-max> <output.csv>]";

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let path = args.get(1).ok_or(USAGE)?;
    let cloud = PointCloud::from_file(path, SEPARATOR).map_err(|e| e.to_string())?;
    debug!("Loaded {} points from {}", cloud.n_points(), path);

    match args.get(2).map(String::as_str) {
        None => {
            // Interactive viewing lives in the viewer frontend; report the
            // validated input and stop
            println!("{}: {} points (storage dimension {})", path, cloud.n_points(), cloud.dim());
            Ok(())
        }
        Some("barcode") => {
            let raw = args.get(3).ok_or(USAGE)?;
            let eps_max: f64 = raw.parse().map_err(|_| format!("bad scale {:?}", raw))?;
            if !(eps_max >= 0.0) || !eps_max.is_finite() {
                return Err(format!("bad scale {:?}", raw));
            }
            let out_path = args.get(4).ok_or(USAGE)?;

            let mut complex = RipsComplex::new(Arc::new(cloud));
            let intervals =
                barcode(&mut complex, eps_max, MAX_DIM - 1).map_err(|e| e.to_string())?;
            let mut file = File::create(out_path).map_err(|e| e.to_string())?;
            write_barcode_csv(&mut file, &intervals).map_err(|e| e.to_string())?;
            debug!("Wrote {} intervals to {}", intervals.len(), out_path);
            Ok(())
        }
        Some(mode) => Err(format!("unknown mode {:?}\n{}", mode, USAGE)),
    }
}
