use crate::error::{GridError, Result};
use crate::gridding::{PitFreeParams, RasterizeOptions, Reducer};
use crate::lidar::PointValue;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path;

/// A structure to hold environment settings. Backed by a settings.json file
/// in the working directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Configs {
    pub verbose_mode: bool,
    pub working_directory: String,
    pub max_procs: isize,
}

impl Default for Configs {
    fn default() -> Configs {
        Configs {
            verbose_mode: false,
            working_directory: String::new(),
            max_procs: -1,
        }
    }
}

fn settings_file() -> Result<String> {
    let dir = std::env::current_dir()?;
    Ok(format!(
        "{}{}settings.json",
        dir.to_string_lossy(),
        path::MAIN_SEPARATOR
    ))
}

/// Reads settings.json from the current directory, falling back to defaults
/// when the file is absent.
pub fn get_configs() -> Result<Configs> {
    let config_file = settings_file()?;
    match fs::read_to_string(&config_file) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|e| GridError::Parse {
            file: config_file,
            line: e.line(),
            message: e.to_string(),
        }),
        Err(_) => Ok(Configs::default()),
    }
}

pub fn save_configs(configs: &Configs) -> Result<()> {
    let configs_json = serde_json::to_string_pretty(configs)
        .map_err(|e| GridError::invalid_parameter("configs", e))?;
    fs::write(settings_file()?, configs_json)?;
    Ok(())
}

/// The serialisable form of every reducer other than `Custom`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReducerSpec {
    Mean {
        #[serde(default)]
        value: PointValue,
    },
    StdDev {
        #[serde(default)]
        value: PointValue,
    },
    PopulationStdDev {
        #[serde(default)]
        value: PointValue,
    },
    Count,
    Density,
    Min {
        #[serde(default)]
        value: PointValue,
    },
    Max {
        #[serde(default)]
        value: PointValue,
    },
    Surface {
        #[serde(default)]
        value: PointValue,
    },
    PitFree(PitFreeParams),
}

impl Default for ReducerSpec {
    fn default() -> ReducerSpec {
        ReducerSpec::Mean {
            value: PointValue::Z,
        }
    }
}

impl ReducerSpec {
    /// Parses a tool argument such as `mean`, `max`, `stdev`, or `pit_free`.
    pub fn from_name(name: &str, value: PointValue) -> Result<ReducerSpec> {
        let spec = match name.trim().to_lowercase().replace('-', "_").as_str() {
            "mean" | "average" => ReducerSpec::Mean { value },
            "stddev" | "stdev" | "std_dev" => ReducerSpec::StdDev { value },
            "population_stddev" | "pop_stdev" => ReducerSpec::PopulationStdDev { value },
            "count" | "num_points" => ReducerSpec::Count,
            "density" => ReducerSpec::Density,
            "min" | "minimum" => ReducerSpec::Min { value },
            "max" | "maximum" => ReducerSpec::Max { value },
            "surface" | "idw" => ReducerSpec::Surface { value },
            "pit_free" | "pitfree" => ReducerSpec::PitFree(PitFreeParams::default()),
            _ => return Err(GridError::invalid_parameter("reducer", name)),
        };
        Ok(spec)
    }

    pub fn to_reducer(&self) -> Reducer {
        match self {
            ReducerSpec::Mean { value } => Reducer::Mean(value.clone()),
            ReducerSpec::StdDev { value } => Reducer::StdDev(value.clone()),
            ReducerSpec::PopulationStdDev { value } => Reducer::PopulationStdDev(value.clone()),
            ReducerSpec::Count => Reducer::Count,
            ReducerSpec::Density => Reducer::Density,
            ReducerSpec::Min { value } => Reducer::Min(value.clone()),
            ReducerSpec::Max { value } => Reducer::Max(value.clone()),
            ReducerSpec::Surface { value } => Reducer::Surface(value.clone()),
            ReducerSpec::PitFree(params) => Reducer::PitFree(params.clone()),
        }
    }
}

/// Immutable configuration of a gridding run. Every field is explicit and is
/// passed per call; nothing is carried between runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GriddingConfig {
    pub resolution: f64,
    /// Side length of a chunk in map units; 0 processes the extent as one chunk.
    pub chunk_size: f64,
    pub buffer: f64,
    pub reducer: ReducerSpec,
    pub interpolate_missing: bool,
    pub k: usize,
    pub power: f64,
    /// KNN search radius; 0 searches without limit.
    pub max_radius: f64,
    /// Spatial index bucket size; 0 picks one from the point density.
    pub bucket_size: f64,
    pub clamp_negative: bool,
}

impl Default for GriddingConfig {
    fn default() -> GriddingConfig {
        GriddingConfig {
            resolution: 1.0,
            chunk_size: 0.0,
            buffer: 0.0,
            reducer: ReducerSpec::default(),
            interpolate_missing: false,
            k: 10,
            power: 2.0,
            max_radius: 50.0,
            bucket_size: 0.0,
            clamp_negative: false,
        }
    }
}

impl GriddingConfig {
    pub fn from_json(json: &str) -> Result<GriddingConfig> {
        let config: GriddingConfig = serde_json::from_str(json).map_err(|e| GridError::Parse {
            file: "<json>".to_string(),
            line: e.line(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(file_name: &str) -> Result<GriddingConfig> {
        let contents = fs::read_to_string(file_name)?;
        let config: GriddingConfig =
            serde_json::from_str(&contents).map_err(|e| GridError::Parse {
                file: file_name.to_string(),
                line: e.line(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field, naming the first offending one.
    pub fn validate(&self) -> Result<()> {
        if !(self.resolution > 0.0) || !self.resolution.is_finite() {
            return Err(GridError::invalid_parameter("resolution", self.resolution));
        }
        if !(self.chunk_size >= 0.0) || !self.chunk_size.is_finite() {
            return Err(GridError::invalid_parameter("chunk_size", self.chunk_size));
        }
        if !(self.buffer >= 0.0) || !self.buffer.is_finite() {
            return Err(GridError::invalid_parameter("buffer", self.buffer));
        }
        if self.k < 1 {
            return Err(GridError::invalid_parameter("k", self.k));
        }
        if !(self.power > 0.0) || !self.power.is_finite() {
            return Err(GridError::invalid_parameter("power", self.power));
        }
        if !(self.max_radius >= 0.0) {
            return Err(GridError::invalid_parameter("max_radius", self.max_radius));
        }
        if !(self.bucket_size >= 0.0) {
            return Err(GridError::invalid_parameter("bucket_size", self.bucket_size));
        }
        if let ReducerSpec::PitFree(params) = &self.reducer {
            params.validate()?;
        }
        Ok(())
    }

    pub fn reducer(&self) -> Reducer {
        self.reducer.to_reducer()
    }

    pub fn rasterize_options(&self) -> RasterizeOptions {
        RasterizeOptions {
            interpolate_missing: self.interpolate_missing,
            k: self.k,
            power: self.power,
            max_radius: if self.max_radius > 0.0 {
                Some(self.max_radius)
            } else {
                None
            },
            bucket_size: if self.bucket_size > 0.0 {
                Some(self.bucket_size)
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::{GriddingConfig, ReducerSpec};
    use crate::error::GridError;
    use crate::gridding::PitFreeParams;
    use crate::lidar::PointValue;

    #[test]
    fn test_defaults() {
        let config = GriddingConfig::from_json("{}").unwrap();
        assert_eq!(config, GriddingConfig::default());
        let options = config.rasterize_options();
        assert_eq!(options.k, 10);
        assert_eq!(options.max_radius, Some(50.0));
        assert_eq!(options.bucket_size, None);
    }

    #[test]
    fn test_reducer_from_json() {
        let config = GriddingConfig::from_json(
            r#"{"resolution": 0.5, "chunk_size": 100, "buffer": 20,
                "reducer": {"type": "max", "value": "intensity"}}"#,
        )
        .unwrap();
        assert_eq!(
            config.reducer,
            ReducerSpec::Max {
                value: PointValue::Attribute("intensity".to_string())
            }
        );
        let config = GriddingConfig::from_json(
            r#"{"reducer": {"type": "pit_free", "thresholds": [0, 5, 10], "max_edge": [0, 1]}}"#,
        )
        .unwrap();
        assert_eq!(
            config.reducer,
            ReducerSpec::PitFree(PitFreeParams {
                thresholds: vec![0.0, 5.0, 10.0],
                max_edge: (0.0, 1.0),
                subcircle: 0.0,
            })
        );
    }

    #[test]
    fn test_validation_names_field() {
        for (json, field) in [
            (r#"{"resolution": 0}"#, "resolution"),
            (r#"{"chunk_size": -5}"#, "chunk_size"),
            (r#"{"buffer": -1}"#, "buffer"),
            (r#"{"k": 0}"#, "k"),
            (r#"{"power": -2}"#, "power"),
        ] {
            match GriddingConfig::from_json(json) {
                Err(GridError::InvalidParameter { name, .. }) => assert_eq!(name, field),
                other => panic!("expected InvalidParameter for {}, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_reducer_names() {
        assert_eq!(
            ReducerSpec::from_name("StDev", PointValue::Z).unwrap(),
            ReducerSpec::StdDev {
                value: PointValue::Z
            }
        );
        assert!(ReducerSpec::from_name("median", PointValue::Z).is_err());
    }
}
