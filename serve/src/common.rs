//! Common imports.

pub use allergen_dl::{
    allergen::{AllergenMap, AllergenRecord},
    classes::ClassIndexMap,
    model::{Classifier, Prediction},
    processor::ImageLoader,
};
pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use log::{error, info, warn};
pub use serde::{Deserialize, Serialize};
pub use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
pub use tch::{Device, IndexOp, Tensor};
