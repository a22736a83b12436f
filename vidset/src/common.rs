pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use futures::stream::{self, StreamExt as _, TryStreamExt as _};
pub use indexmap::IndexMap;
pub use itertools::Itertools as _;
pub use log::{debug, info, warn};
pub use ndarray::{Array1, Array2, Array3, Array4, Array5, Axis};
pub use serde::{Deserialize, Serialize};
pub use std::{
    collections::HashMap,
    fmt,
    fmt::Debug,
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

pub type Fallible<T> = Result<T, Error>;
