use super::{gridding_config, gridding_parameters, read_filtered_points};
use crate::configs::{get_configs, ReducerSpec};
use crate::gridding::TileManager;
use crate::lidar::PointValue;
use crate::raster::{ArcAsciiWriter, RasterSink};
use crate::tools::*;
use crate::utils::get_formatted_elapsed_time;
use std::io::{Error, ErrorKind};
use std::time::Instant;

/// Produces a digital terrain model from the ground-classified (class 2)
/// points and a canopy height model from all points after their elevations
/// have been normalized against that terrain.
pub struct CanopyHeightModel {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl CanopyHeightModel {
    pub fn new() -> CanopyHeightModel {
        // public constructor
        let name = "CanopyHeightModel".to_string();
        let toolbox = "LiDAR Tools".to_string();
        let description =
            "Creates a terrain model from ground points and a canopy height model from height-normalized points."
                .to_string();

        let mut parameters = vec![
            ToolParameter {
                name: "Input Points File".to_owned(),
                flags: vec!["-i".to_owned(), "--input".to_owned()],
                description: "Input delimited-text point file with x,y,z and class columns.".to_owned(),
                parameter_type: ParameterType::ExistingFile(ParameterFileType::Csv),
                default_value: None,
                optional: false,
            },
            ToolParameter {
                name: "Output Canopy Height File".to_owned(),
                flags: vec!["-o".to_owned(), "--output".to_owned()],
                description: "Output canopy height model raster file.".to_owned(),
                parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
                default_value: None,
                optional: false,
            },
            ToolParameter {
                name: "Output Terrain File".to_owned(),
                flags: vec!["--dtm".to_owned()],
                description: "Optional output terrain model raster file.".to_owned(),
                parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
                default_value: None,
                optional: true,
            },
            ToolParameter {
                name: "Canopy Reducer".to_owned(),
                flags: vec!["--reducer".to_owned()],
                description: "Statistic used to grid normalized heights, e.g. 'max' or 'pit_free'.".to_owned(),
                parameter_type: ParameterType::String,
                default_value: Some("max".to_owned()),
                optional: true,
            },
            ToolParameter {
                name: "Pit-Free Height Thresholds".to_owned(),
                flags: vec!["--thresholds".to_owned()],
                description: "Comma-separated, ascending height thresholds of the pit-free layers.".to_owned(),
                parameter_type: ParameterType::String,
                default_value: Some("0,2,5,10,15".to_owned()),
                optional: true,
            },
            ToolParameter {
                name: "Pit-Free Max Edge".to_owned(),
                flags: vec!["--max_edge".to_owned()],
                description: "Gap-filling search radius of the pit-free layers above the first.".to_owned(),
                parameter_type: ParameterType::Float,
                default_value: Some("1.5".to_owned()),
                optional: true,
            },
            ToolParameter {
                name: "Sub-circle Radius".to_owned(),
                flags: vec!["--subcircle".to_owned()],
                description: "Radius of the circle each point is expanded to before pit-free gridding.".to_owned(),
                parameter_type: ParameterType::Float,
                default_value: Some("0.0".to_owned()),
                optional: true,
            },
            ToolParameter {
                name: "Clamp Negative Heights?".to_owned(),
                flags: vec!["--clamp_negative".to_owned()],
                description: "Floor normalized heights below the terrain to zero.".to_owned(),
                parameter_type: ParameterType::Boolean,
                default_value: Some("false".to_owned()),
                optional: true,
            },
        ];
        parameters.extend(gridding_parameters());

        let usage = example_usage(
            &name,
            "-i=points.csv -o=chm.asc --dtm=dtm.asc --resolution=1.0 --reducer=pit_free --thresholds='0,2,5,10' --clamp_negative",
        );

        CanopyHeightModel {
            name,
            description,
            toolbox,
            parameters,
            example_usage: usage,
        }
    }
}

impl WhiteboxTool for CanopyHeightModel {
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
        let output_file =
            resolve_path(&args.require(&["-o", "-output"], "output")?, working_directory);
        let dtm_file = args.get(&["-dtm"]).map(|f| resolve_path(&f, working_directory));
        let mut config = gridding_config(&args, working_directory)?;
        if args.get(&["-reducer", "-stat", "-type"]).is_none() && args.get(&["-config"]).is_none() {
            config.reducer = ReducerSpec::Max {
                value: PointValue::Z,
            };
        }
        let max_procs = match args.get_f64(&["-max_procs"], "max_procs")? {
            Some(v) => v as isize,
            None => get_configs()?.max_procs,
        };

        if verbose {
            print_banner(&self.get_tool_name());
        }

        let start = Instant::now();

        if verbose {
            println!("Reading input points...");
        }
        let points = read_filtered_points(&args, &input_file, verbose)?;

        let manager = TileManager::from_config(&config)?
            .with_max_procs(max_procs)
            .with_verbose(verbose);
        let canopy = config.reducer();
        if verbose {
            println!("Creating terrain and canopy height models...");
        }
        let mut models = manager.canopy_height_model(&points, &canopy)?;
        if verbose {
            println!("{}", models.report);
        }

        let elapsed_time = get_formatted_elapsed_time(start);
        for grid in [&mut models.dtm, &mut models.chm] {
            grid.add_metadata_entry(format!(
                "Created by whitebox_gridding\'s {} tool",
                self.get_tool_name()
            ));
            grid.add_metadata_entry(format!("Input file: {}", input_file));
            grid.add_metadata_entry(format!(
                "Elapsed Time (excluding I/O): {}",
                elapsed_time
            ));
        }
        models
            .chm
            .add_metadata_entry(format!("Canopy reducer: {:?}", canopy));

        if verbose {
            println!("Saving data...")
        };
        if let Some(dtm_file) = dtm_file {
            ArcAsciiWriter::new(&dtm_file).write_grid(&models.dtm)?;
        }
        ArcAsciiWriter::new(&output_file).write_grid(&models.chm)?;
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
