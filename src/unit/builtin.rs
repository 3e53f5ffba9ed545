use super::contract::{BaseInit, BaseUnit, ProcessController, UnitLogger};
use super::registry::UnitRegistryBuilder;
use crate::controller::ScheduleController;
use crate::errors::Result;

/// Base unit that only logs its tick. Useful as a processor placeholder
/// while wiring up a new process definition.
pub struct NoOpProcessor {
    logger: UnitLogger,
}

impl BaseUnit for NoOpProcessor {
    fn name(&self) -> &str {
        "NoOpProcessor"
    }

    fn run(&self) -> Result<()> {
        self.logger.info("nothing to do");
        Ok(())
    }
}

/// Registers the units shipped with the framework itself.
pub fn register_builtins(builder: &mut UnitRegistryBuilder) -> Result<()> {
    builder.register_controller("ScheduleController", |init| {
        Ok(Box::new(ScheduleController::new(init)) as Box<dyn ProcessController>)
    })?;
    builder.register_base("NoOpProcessor", Vec::new(), |init: BaseInit| {
        Ok(Box::new(NoOpProcessor {
            logger: init.logger,
        }) as Box<dyn BaseUnit>)
    })?;
    Ok(())
}
