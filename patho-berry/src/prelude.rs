//! 🔬欢迎光临🧫
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Point};

pub use crate::data::{
    BoundingBox, CellInstance, CellLabel, CoarseType, Contour, ContourStore, RoiImage, RoiName,
};

pub use crate::features::{extract, CellFeatures};

pub use crate::classify::{CellClassifier, GbtModel, ModelHandle};

pub use crate::aggregate::{aggregate, Aggregator, CellFeatureRecord, LesionFeatureSummary, RoiFeatures};

pub use crate::spatial::{altieri_entropy, AltieriEntropy, EmbedMap, TextureFeatures};

pub use crate::dataset::{home_dataset_dir_with, Dataset, DatasetLayout, RoiLoader};

pub use crate::batch::{BatchReport, RoiTask};

pub use crate::error::{ModelError, RoiError, RoiResult};

pub use crate::consts::{DEFAULT_ENTROPY_CUTS, DEFAULT_MIN_CELL_COUNT, DEFAULT_UNIT_AREA_SCALE};
