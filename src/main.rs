use wardsim::{event_reports, region, runner};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runner::run_with_args(|context, _args| {
        event_reports::init(context)?;
        region::init(context)?;
        Ok(())
    })?;
    Ok(())
}
