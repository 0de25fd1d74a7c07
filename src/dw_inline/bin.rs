use droidworks_deodex::prelude::DwResult;
use droidworks_deodex::{cli, dw_inline};

fn main() -> DwResult<()> {
    let args = cli::inline().get_matches();
    dw_inline::run(&args)
}
