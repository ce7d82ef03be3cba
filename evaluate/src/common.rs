//! Common imports.

pub use allergen_dl::{
    classes::ClassIndexMap,
    generator::{BatchGenerator, BatchGeneratorInit},
    model::Classifier,
    processor::ImageLoader,
};
pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use itertools::Itertools as _;
pub use log::{error, info, warn};
pub use serde::{Deserialize, Serialize};
pub use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};
pub use tch::{Device, Kind, Tensor};
