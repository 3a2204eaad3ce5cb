use super::{gridding_config, gridding_parameters, read_filtered_points};
use crate::configs::get_configs;
use crate::gridding::TileManager;
use crate::raster::{ArcAsciiWriter, RasterSink};
use crate::tools::*;
use crate::utils::get_formatted_elapsed_time;
use std::io::{Error, ErrorKind};
use std::time::Instant;

/// Grids a delimited-text point cloud into an ArcAscii raster using any of the
/// bucket reducers (mean, min, max, count, density, standard deviation), a
/// KNN inverse-distance surface, or a pit-free canopy surface. Large extents
/// are split into buffered chunks that are processed in parallel.
pub struct RasterizePoints {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl RasterizePoints {
    pub fn new() -> RasterizePoints {
        // public constructor
        let name = "RasterizePoints".to_string();
        let toolbox = "LiDAR Tools".to_string();
        let description =
            "Grids a point cloud using a per-cell statistic or an inverse-distance weighted surface."
                .to_string();

        let mut parameters = vec![
            ToolParameter {
                name: "Input Points File".to_owned(),
                flags: vec!["-i".to_owned(), "--input".to_owned()],
                description: "Input delimited-text point file with an x,y,z header.".to_owned(),
                parameter_type: ParameterType::ExistingFile(ParameterFileType::Csv),
                default_value: None,
                optional: false,
            },
            ToolParameter {
                name: "Output File".to_owned(),
                flags: vec!["-o".to_owned(), "--output".to_owned()],
                description: "Output ArcAscii raster file.".to_owned(),
                parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
                default_value: None,
                optional: false,
            },
            ToolParameter {
                name: "Cell Reducer".to_owned(),
                flags: vec!["--reducer".to_owned()],
                description: "Per-cell statistic.".to_owned(),
                parameter_type: ParameterType::OptionList(vec![
                    "mean".to_owned(),
                    "min".to_owned(),
                    "max".to_owned(),
                    "count".to_owned(),
                    "density".to_owned(),
                    "stddev".to_owned(),
                    "population_stddev".to_owned(),
                    "surface".to_owned(),
                    "pit_free".to_owned(),
                ]),
                default_value: Some("mean".to_owned()),
                optional: true,
            },
            ToolParameter {
                name: "Interpolation Parameter".to_owned(),
                flags: vec!["--parameter".to_owned()],
                description: "Point value to grid; 'elevation' or the name of any attribute column such as 'intensity'.".to_owned(),
                parameter_type: ParameterType::String,
                default_value: Some("elevation".to_owned()),
                optional: true,
            },
        ];
        parameters.extend(gridding_parameters());

        let usage = example_usage(
            &name,
            "-i=points.csv -o=outfile.asc --resolution=2.0 --reducer=max\n--reducer=surface --parameter=intensity --chunk_size=500 --buffer=25 --exclude_cls='7,18'",
        );

        RasterizePoints {
            name,
            description,
            toolbox,
            parameters,
            example_usage: usage,
        }
    }
}

impl WhiteboxTool for RasterizePoints {
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
        let config = gridding_config(&args, working_directory)?;
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
        log::info!("read {} points from {}", points.len(), input_file);

        let reducer = config.reducer();
        let manager = TileManager::from_config(&config)?
            .with_max_procs(max_procs)
            .with_verbose(verbose);
        let mut output = manager.rasterize_tiled(&points, &reducer)?;

        let elapsed_time = get_formatted_elapsed_time(start);
        output.add_metadata_entry(format!(
            "Created by whitebox_gridding\'s {} tool",
            self.get_tool_name()
        ));
        output.add_metadata_entry(format!("Input file: {}", input_file));
        output.add_metadata_entry(format!("Reducer: {:?}", reducer));
        output.add_metadata_entry(format!("Grid resolution: {}", config.resolution));
        output.add_metadata_entry(format!(
            "Elapsed Time (excluding I/O): {}",
            elapsed_time
        ));

        if verbose {
            println!("Saving data...")
        };
        ArcAsciiWriter::new(&output_file).write_grid(&output)?;
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
