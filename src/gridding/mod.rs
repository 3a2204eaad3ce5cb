// private sub-module defined in other files
mod knn_interpolator;
mod normalize;
mod pit_free;
mod rasterizer;
mod reducer;
mod tile_manager;

// exports identifiers from private sub-modules in the current module namespace
pub use self::knn_interpolator::{interpolate, KnnInterpolator};
pub use self::normalize::{normalize, terrain_height, NormalizeReport};
pub use self::pit_free::{rasterize_pit_free, PitFreeParams};
pub use self::rasterizer::{
    build_index, rasterize, rasterize_view, rasterize_window, CellWindow, RasterizeOptions,
};
pub use self::reducer::{CellFn, Reducer};
pub use self::tile_manager::{
    rasterize_tiled, CancellationToken, Chunk, HeightModels, TileManager,
};
