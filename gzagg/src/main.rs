mod application;
mod presentation;

use gzagg_core::error::Result;

fn main() -> Result<()> {
    application::run()
}
