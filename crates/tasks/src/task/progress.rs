use std::{
    fmt,
    io::{self, Write},
    time::Instant,
};

use opt_tools_core::{Action, Objective};

use crate::{Context, Error, Schedule, Task};

const HEADER: &str = "Iter\tfunc\t\tgrad\t\titer/s\t\tTimestamp";

/// Prints a single, continually overwritten progress line.
///
/// Each line shows the iteration, objective value, gradient norm, iterations
/// per second since this printer last fired, and a local timestamp. A header
/// row is written before the first line.
pub struct ProgressPrinter {
    schedule: Schedule,
    out: Box<dyn Write>,
    header_written: bool,
    last: (usize, Instant),
}

impl ProgressPrinter {
    /// Creates a printer that writes to standard output.
    #[must_use]
    pub fn new(schedule: Schedule) -> Self {
        Self::with_writer(schedule, io::stdout())
    }

    /// Creates a printer that writes to `out`.
    pub fn with_writer<W: Write + 'static>(schedule: Schedule, out: W) -> Self {
        Self {
            schedule,
            out: Box::new(out),
            header_written: false,
            last: (0, Instant::now()),
        }
    }
}

impl<O: Objective> Task<O> for ProgressPrinter {
    fn name(&self) -> &'static str {
        "progress"
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    fn fire(&mut self, ctx: &mut Context<O>, x: &[f64]) -> Result<Option<Action>, Error> {
        let evaluation = ctx.evaluate(x)?;
        let iteration = ctx.iteration();

        let (last_iteration, last_time) = self.last;
        #[allow(clippy::cast_precision_loss)]
        let rate = iteration.saturating_sub(last_iteration) as f64
            / last_time.elapsed().as_secs_f64();

        if !self.header_written {
            writeln!(self.out, "{HEADER}")?;
            self.header_written = true;
        }
        write!(
            self.out,
            "\r{iteration}\t{:.6e}\t{:.6e}\t{rate:.6}\t{}\t",
            evaluation.f,
            evaluation.gradient_norm(),
            jiff::Zoned::now().strftime("%a %b %e %H:%M:%S %Y"),
        )?;
        self.out.flush()?;

        self.last = (iteration, Instant::now());
        Ok(None)
    }
}

impl fmt::Debug for ProgressPrinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressPrinter")
            .field("schedule", &self.schedule)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}
