// private sub-module defined in other files
mod canopy_height_model;
mod normalize_lidar;
mod rasterize_points;

// exports identifiers from private sub-modules in the current module namespace
pub use self::canopy_height_model::CanopyHeightModel;
pub use self::normalize_lidar::NormalizeLidar;
pub use self::rasterize_points::RasterizePoints;

use crate::configs::{GriddingConfig, ReducerSpec};
use crate::gridding::PitFreeParams;
use crate::lidar::{AsciiPointReader, PointSet, PointSource, PointValue};
use crate::tools::{parse_class_list, resolve_path, ParameterType, ToolArgs, ToolParameter};
use std::f64;
use std::io::Error;

/// Parameters shared by the tools that grid points.
fn gridding_parameters() -> Vec<ToolParameter> {
    vec![
        ToolParameter {
            name: "Gridding Configuration File".to_owned(),
            flags: vec!["--config".to_owned()],
            description: "Optional JSON gridding configuration; flags given on the command line override its values.".to_owned(),
            parameter_type: ParameterType::ExistingFile(crate::tools::ParameterFileType::Text),
            default_value: None,
            optional: true,
        },
        ToolParameter {
            name: "Grid Resolution".to_owned(),
            flags: vec!["--resolution".to_owned()],
            description: "Output raster's grid resolution.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("1.0".to_owned()),
            optional: true,
        },
        ToolParameter {
            name: "Chunk Size".to_owned(),
            flags: vec!["--chunk_size".to_owned()],
            description: "Side length of the chunks processed in parallel, in map units; 0 processes the extent as one chunk.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("0.0".to_owned()),
            optional: true,
        },
        ToolParameter {
            name: "Chunk Buffer".to_owned(),
            flags: vec!["--buffer".to_owned()],
            description: "Overlap added around each chunk when selecting its points, in map units.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("0.0".to_owned()),
            optional: true,
        },
        ToolParameter {
            name: "Interpolate Missing Cells?".to_owned(),
            flags: vec!["--interpolate".to_owned()],
            description: "Fill cells that contain no points with a KNN inverse-distance estimate.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_owned()),
            optional: true,
        },
        ToolParameter {
            name: "Number of Neighbours".to_owned(),
            flags: vec!["--k".to_owned()],
            description: "Number of nearest neighbours used by the interpolator.".to_owned(),
            parameter_type: ParameterType::Integer,
            default_value: Some("10".to_owned()),
            optional: true,
        },
        ToolParameter {
            name: "IDW Weight (Exponent) Value".to_owned(),
            flags: vec!["--weight".to_owned(), "--power".to_owned()],
            description: "IDW weight value.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("2.0".to_owned()),
            optional: true,
        },
        ToolParameter {
            name: "Search Radius".to_owned(),
            flags: vec!["--radius".to_owned()],
            description: "Maximum neighbour search distance; 0 searches without limit.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("50.0".to_owned()),
            optional: true,
        },
        ToolParameter {
            name: "Exclusion Classes".to_owned(),
            flags: vec!["--exclude_cls".to_owned()],
            description: "Optional exclude classes from interpolation, e.g. --exclude_cls='3,4,5,6,7,18'.".to_owned(),
            parameter_type: ParameterType::String,
            default_value: None,
            optional: true,
        },
        ToolParameter {
            name: "Minimum Elevation Value".to_owned(),
            flags: vec!["--minz".to_owned()],
            description: "Optional minimum elevation for inclusion in interpolation.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: None,
            optional: true,
        },
        ToolParameter {
            name: "Maximum Elevation Value".to_owned(),
            flags: vec!["--maxz".to_owned()],
            description: "Optional maximum elevation for inclusion in interpolation.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: None,
            optional: true,
        },
        ToolParameter {
            name: "Coordinate Reference System".to_owned(),
            flags: vec!["--crs".to_owned()],
            description: "Optional CRS tag (e.g. EPSG:26917) written with the output.".to_owned(),
            parameter_type: ParameterType::String,
            default_value: None,
            optional: true,
        },
    ]
}

/// Builds a gridding configuration from an optional `--config` file and the
/// command-line flags that override it.
fn gridding_config(args: &ToolArgs, working_directory: &str) -> Result<GriddingConfig, Error> {
    let mut config = match args.get(&["-config"]) {
        Some(f) => GriddingConfig::from_file(&resolve_path(&f, working_directory))?,
        None => GriddingConfig::default(),
    };
    if let Some(v) = args.get_f64(&["-resolution"], "resolution")? {
        config.resolution = v;
    }
    if let Some(v) = args.get_f64(&["-chunk_size"], "chunk_size")? {
        config.chunk_size = v;
    }
    if let Some(v) = args.get_f64(&["-buffer"], "buffer")? {
        config.buffer = v;
    }
    if args.flag(&["-interpolate"]) {
        config.interpolate_missing = true;
    }
    if let Some(v) = args.get_usize(&["-k"], "k")? {
        config.k = v;
    }
    if let Some(v) = args.get_f64(&["-weight", "-power"], "power")? {
        config.power = v;
    }
    if let Some(v) = args.get_f64(&["-radius", "-max_radius"], "max_radius")? {
        config.max_radius = v;
    }
    if let Some(v) = args.get_f64(&["-bucket_size"], "bucket_size")? {
        config.bucket_size = v;
    }
    if args.flag(&["-clamp_negative", "-no_negatives"]) {
        config.clamp_negative = true;
    }
    if let Some(name) = args.get(&["-reducer", "-stat", "-type"]) {
        let value = args
            .get(&["-parameter", "-value"])
            .map(|v| PointValue::from_name(&v))
            .unwrap_or_default();
        config.reducer = ReducerSpec::from_name(&name, value)?;
    }
    if let ReducerSpec::PitFree(params) = &mut config.reducer {
        pit_free_overrides(args, params)?;
    }
    config.validate()?;
    Ok(config)
}

fn pit_free_overrides(args: &ToolArgs, params: &mut PitFreeParams) -> Result<(), Error> {
    if let Some(s) = args.get(&["-thresholds"]) {
        params.thresholds = parse_class_list(&s, "thresholds")?;
    }
    if let Some(v) = args.get_f64(&["-max_edge"], "max_edge")? {
        params.max_edge.1 = v;
    }
    if let Some(v) = args.get_f64(&["-first_edge"], "max_edge")? {
        params.max_edge.0 = v;
    }
    if let Some(v) = args.get_f64(&["-subcircle"], "subcircle")? {
        params.subcircle = v;
    }
    Ok(())
}

/// Reads the input points and drops excluded classes and out-of-range elevations.
fn read_filtered_points(
    args: &ToolArgs,
    input_file: &str,
    verbose: bool,
) -> Result<PointSet, Error> {
    let crs = args.get(&["-crs"]);
    let points = AsciiPointReader::new(input_file).read_points(crs.as_deref())?;
    let excluded = match args.get(&["-exclude_cls"]) {
        Some(s) => parse_class_list(&s, "exclude_cls")?,
        None => vec![],
    };
    let min_z = args.get_f64(&["-minz"], "minz")?.unwrap_or(f64::NEG_INFINITY);
    let max_z = args.get_f64(&["-maxz"], "maxz")?.unwrap_or(f64::INFINITY);
    if excluded.is_empty() && min_z == f64::NEG_INFINITY && max_z == f64::INFINITY {
        return Ok(points);
    }
    let filtered = points
        .select(|p| {
            let class_ok = match p.classification() {
                Some(c) => !excluded.contains(&c),
                None => true,
            };
            class_ok && p.z >= min_z && p.z <= max_z
        })
        .to_point_set();
    if verbose {
        println!(
            "{} of {} points retained after filtering.",
            filtered.len(),
            points.len()
        );
    }
    Ok(filtered)
}
