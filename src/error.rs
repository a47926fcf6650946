use thiserror::Error;

use quarry_xpath::XPathError;

/// Everything that can stop the `quarry` command.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse XML document: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error(transparent)]
    XPath(#[from] XPathError),

    #[error("Invalid variable binding '{0}', expected NAME=VALUE")]
    InvalidBinding(String),
}
