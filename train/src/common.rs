//! Common imports.

pub use allergen_dl::{
    classes::ClassIndexMap,
    generator::{BatchGenerator, BatchGeneratorInit},
    model::Classifier,
    processor::{BatchAugmentor, BatchAugmentorInit, ImageLoader},
};
pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use chrono::Local;
pub use itertools::Itertools as _;
pub use log::{error, info, warn};
pub use noisy_float::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
pub use tch::{
    nn::{self, OptimizerConfig as _},
    Device, Kind, Tensor,
};
