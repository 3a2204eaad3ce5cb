/*
NOTES: NoData values in the input image are ignored by the weighted-sum
filter; they contribute nothing and the weights are not renormalized. The
edge policy decides what happens where the kernel overhangs the grid edge:
'shrink' leaves the overhanging cells out, 'nodata' makes the output cell
NoData, and 'clamp' repeats the nearest edge cell. Normalizing the kernel
scales the weights to sum to one, which lets integer weights be supplied;
kernels whose weights sum to zero (e.g. edge detectors) are left as is.
*/

use crate::filters::{apply, EdgePolicy, FocalReducer, Kernel, KernelAnchor};
use crate::raster::{read_arcascii, ArcAsciiWriter, RasterSink};
use crate::tools::*;
use crate::utils::get_formatted_elapsed_time;
use std::io::{Error, ErrorKind};
use std::time::Instant;

pub struct UserDefinedWeightsFilter {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl UserDefinedWeightsFilter {
    pub fn new() -> UserDefinedWeightsFilter {
        // public constructor
        let name = "UserDefinedWeightsFilter".to_string();
        let toolbox = "Image Processing Tools/Filters".to_string();
        let description = "Performs a user-defined weights filter on an image.".to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Input File".to_owned(),
            flags: vec!["-i".to_owned(), "--input".to_owned()],
            description: "Input ArcAscii raster file.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Input Weights File".to_owned(),
            flags: vec!["--weights".to_owned()],
            description: "Input weights file; one kernel row per line, top row first.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Csv),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Output File".to_owned(),
            flags: vec!["-o".to_owned(), "--output".to_owned()],
            description: "Output raster file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Kernel Center".to_owned(),
            flags: vec!["--center".to_owned()],
            description: "Kernel center cell; options include 'center', 'upper-left', 'upper-right', 'lower-left', 'lower-right'".to_owned(),
            parameter_type: ParameterType::OptionList(vec![
                "center".to_owned(),
                "upper-left".to_owned(),
                "upper-right".to_owned(),
                "lower-left".to_owned(),
                "lower-right".to_owned(),
            ]),
            default_value: Some("center".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Normalize kernel weights?".to_owned(),
            flags: vec!["--normalize".to_owned()],
            description: "Scale the kernel weights to sum to one? Not applied to kernels whose weights sum to zero.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Neighbourhood Reducer".to_owned(),
            flags: vec!["--reducer".to_owned()],
            description: "'weighted_sum', or a statistic of the cells under the non-zero weights.".to_owned(),
            parameter_type: ParameterType::OptionList(vec![
                "weighted_sum".to_owned(),
                "mean".to_owned(),
                "sum".to_owned(),
                "min".to_owned(),
                "max".to_owned(),
                "range".to_owned(),
                "median".to_owned(),
                "stddev".to_owned(),
            ]),
            default_value: Some("weighted_sum".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Edge Policy".to_owned(),
            flags: vec!["--edge".to_owned()],
            description: "Treatment of cells beyond the grid edge; 'shrink', 'nodata', or 'clamp'.".to_owned(),
            parameter_type: ParameterType::OptionList(vec![
                "shrink".to_owned(),
                "nodata".to_owned(),
                "clamp".to_owned(),
            ]),
            default_value: Some("shrink".to_owned()),
            optional: true,
        });

        let usage = example_usage(
            &name,
            "-i=image.asc --weights=weights.txt -o=output.asc --center=center --normalize --edge=clamp",
        );

        UserDefinedWeightsFilter {
            name,
            description,
            toolbox,
            parameters,
            example_usage: usage,
        }
    }
}

impl WhiteboxTool for UserDefinedWeightsFilter {
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
        let weights_file = resolve_path(&args.require(&["-weights"], "weights")?, working_directory);
        let output_file =
            resolve_path(&args.require(&["-o", "-output"], "output")?, working_directory);
        let anchor = match args.get(&["-center", "-centre"]) {
            Some(s) => KernelAnchor::from_name(&s)?,
            None => KernelAnchor::Center,
        };
        let normalize = args.flag(&["-normalize"]);
        let reducer = match args.get(&["-reducer", "-statistic"]) {
            Some(s) => FocalReducer::from_name(&s)?,
            None => FocalReducer::WeightedSum,
        };
        let edge_policy = match args.get(&["-edge", "-edge_policy"]) {
            Some(s) => EdgePolicy::from_name(&s)?,
            None => EdgePolicy::Shrink,
        };

        if verbose {
            print_banner(&self.get_tool_name());
        }

        if verbose {
            println!("Reading data...")
        };
        let input = read_arcascii(&input_file)?;
        let mut kernel = Kernel::from_file(&weights_file, anchor)?;
        if normalize {
            kernel = kernel.normalized();
        }
        log::info!(
            "applying a {}x{} kernel anchored at {:?}",
            kernel.rows(),
            kernel.columns(),
            kernel.anchor()
        );

        let start = Instant::now();
        let mut output = apply(&input, &kernel, &reducer, edge_policy)?;
        let elapsed_time = get_formatted_elapsed_time(start);

        output.add_metadata_entry(format!(
            "Created by whitebox_gridding\'s {} tool",
            self.get_tool_name()
        ));
        output.add_metadata_entry(format!("Input file: {}", input_file));
        output.add_metadata_entry(format!("Weights file: {}", weights_file));
        output.add_metadata_entry(format!("Normalize: {}", normalize));
        output.add_metadata_entry(format!("Reducer: {:?}", reducer));
        output.add_metadata_entry(format!("Edge policy: {:?}", edge_policy));
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
