use super::read_filtered_points;
use crate::gridding::normalize;
use crate::lidar::write_ascii_points;
use crate::raster::read_arcascii;
use crate::tools::*;
use crate::utils::get_formatted_elapsed_time;
use std::io::{Error, ErrorKind};
use std::time::Instant;

/// Normalizes point elevations against a terrain raster, so that z becomes
/// height above ground.
pub struct NormalizeLidar {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl NormalizeLidar {
    pub fn new() -> NormalizeLidar {
        // public constructor
        let name = "NormalizeLidar".to_string();
        let toolbox = "LiDAR Tools".to_string();
        let description = "Normalizes a point cloud, i.e. converts elevations into heights above the ground, using a terrain raster.".to_string();

        let parameters = vec![
            ToolParameter {
                name: "Input Points File".to_owned(),
                flags: vec!["-i".to_owned(), "--input".to_owned()],
                description: "Input delimited-text point file.".to_owned(),
                parameter_type: ParameterType::ExistingFile(ParameterFileType::Csv),
                default_value: None,
                optional: false,
            },
            ToolParameter {
                name: "Input Terrain Raster".to_owned(),
                flags: vec!["--dtm".to_owned()],
                description: "Input ArcAscii digital terrain model.".to_owned(),
                parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
                default_value: None,
                optional: false,
            },
            ToolParameter {
                name: "Output Points File".to_owned(),
                flags: vec!["-o".to_owned(), "--output".to_owned()],
                description: "Output normalized point file.".to_owned(),
                parameter_type: ParameterType::NewFile(ParameterFileType::Csv),
                default_value: None,
                optional: false,
            },
            ToolParameter {
                name: "Clamp Negative Heights?".to_owned(),
                flags: vec!["--no_negatives".to_owned()],
                description: "Floor heights below the terrain to zero.".to_owned(),
                parameter_type: ParameterType::Boolean,
                default_value: Some("false".to_owned()),
                optional: true,
            },
            ToolParameter {
                name: "Coordinate Reference System".to_owned(),
                flags: vec!["--crs".to_owned()],
                description: "Optional CRS tag applied to the input points.".to_owned(),
                parameter_type: ParameterType::String,
                default_value: None,
                optional: true,
            },
        ];

        let usage = example_usage(
            &name,
            "-i=points.csv --dtm=dtm.asc -o=normalized.csv --no_negatives",
        );

        NormalizeLidar {
            name,
            description,
            toolbox,
            parameters,
            example_usage: usage,
        }
    }
}

impl WhiteboxTool for NormalizeLidar {
    fn get_tool_name(&self) -> String {
        self.name.clone()
    }

    fn get_tool_description(&self) -> String {
        self.description.clone()
    }

    fn get_tool_parameters(&self) -> String {
        parameters_to_json(&self.parameters)
    }

    fn get_example_usage(&self) -> String {
        self.example_usage.clone()
    }

    fn get_toolbox(&self) -> String {
        self.toolbox.clone()
    }

    fn run<'a>(
        &self,
        args: Vec<String>,
        working_directory: &'a str,
        verbose: bool,
    ) -> Result<(), Error> {
        let args = ToolArgs::parse(&args);
        if args.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Tool run with no parameters.",
            ));
        }
        let input_file = resolve_path(&args.require(&["-i", "-input"], "input")?, working_directory);
        let dtm_file = resolve_path(&args.require(&["-dtm"], "dtm")?, working_directory);
        let output_file =
            resolve_path(&args.require(&["-o", "-output"], "output")?, working_directory);
        let clamp_negative = args.flag(&["-no_negatives", "-clamp_negative"]);

        if verbose {
            print_banner(&self.get_tool_name());
        }

        if verbose {
            println!("Reading data...")
        };
        let points = read_filtered_points(&args, &input_file, verbose)?;
        let dtm = read_arcascii(&dtm_file)?;

        let start = Instant::now();
        let (normalized, report) = normalize(&points, &dtm, clamp_negative);
        let elapsed_time = get_formatted_elapsed_time(start);

        if verbose {
            println!("{}", report);
            println!("Saving data...")
        };
        write_ascii_points(&output_file, &normalized)?;
        if verbose {
            println!("Output file written");
            println!(
                "{}",
                &format!("Elapsed Time (excluding I/O): {}", elapsed_time)
            );
        }

        Ok(())
    }
}
