pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use indexmap::{IndexMap, IndexSet};
pub use itertools::Itertools as _;
pub use log::{error, info, warn};
pub use noisy_float::prelude::*;
pub use rand::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    cmp,
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    fmt::Debug,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
pub use tch::{
    kind::FLOAT_CPU,
    nn::{self, ModuleT as _},
    vision, Device, IndexOp, Kind, Tensor,
};
