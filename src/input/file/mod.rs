// SPDX-License-Identifier: Apache-2.0

mod factory;
mod finder;
mod fingerprint;
mod lock;
mod metadata;
mod reader;
mod scanner;

pub use factory::ReaderFactory;
pub use finder::FileFinder;
pub use fingerprint::Fingerprint;
pub use metadata::{FileType, Metadata};
pub use reader::Reader;
