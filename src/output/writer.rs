//! Plain-text output of a run.
//!
//! Inside `directory`, at every output step:
//! - `cartesian_NNNNN.txt`: one line per live body,
//!   `index generation x y z vx vy vz` (when `cartesian`)
//! - `elliptic_NNNNN.txt`: one line per live body,
//!   `index generation a e i nu omega Omega` about the central body (when
//!   `elliptic`)
//! - `radius.txt`, `mass.txt`: one line appended, the radii (masses) of the
//!   live bodies in slot order
//! - `stat.txt`: one line appended with the time, the live count and the run
//!   counters
//!
//! `init.txt` is the resume checkpoint, written at the end of the run in the
//! 8-column cartesian format read back by [`read_init_file`]. The reader
//! accepts the same 8 columns (6 coordinates, mass, radius), either cartesian
//! or elliptic elements. Blank lines and lines starting with `#` are skipped.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::configuration::config::OutputConfig;
use crate::simulation::elements::OrbitalElements;
use crate::simulation::error::SimError;
use crate::simulation::integrator::Simulation;
use crate::simulation::states::{Body, NVec3};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SimError + '_ {
    move |source| SimError::Io { path: path.to_path_buf(), source }
}

pub struct OutputWriter {
    directory: PathBuf,
    cartesian: bool,
    elliptic: bool,
    resume: bool,
    snapshots: usize,
}

impl OutputWriter {
    /// Create the output directory and start a fresh `stat.txt`
    pub fn create(cfg: &OutputConfig) -> Result<Self, SimError> {
        let directory = PathBuf::from(&cfg.directory);
        fs::create_dir_all(&directory).map_err(io_error(&directory))?;

        let stat = directory.join("stat.txt");
        let mut f = File::create(&stat).map_err(io_error(&stat))?;
        writeln!(
            f,
            "# t bodies collisions bounces mergers partial full disruptions fallen escaped spawned absorbed_mass lost_mass"
        )
        .map_err(io_error(&stat))?;
        for name in ["radius.txt", "mass.txt"] {
            let path = directory.join(name);
            File::create(&path).map_err(io_error(&path))?;
        }

        info!("writing output to {}", directory.display());
        Ok(Self {
            directory,
            cartesian: cfg.cartesian,
            elliptic: cfg.elliptic,
            resume: cfg.resume,
            snapshots: 0,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Snapshots and per-step lines for the current state
    pub fn write(&mut self, sim: &Simulation) -> Result<(), SimError> {
        if self.cartesian {
            self.write_snapshot(sim, "cartesian", |b| [b.x.x, b.x.y, b.x.z, b.v.x, b.v.y, b.v.z])?;
        }
        if self.elliptic {
            let (origin, v_origin, mu) = match &sim.central {
                Some(c) => (c.x, c.v, sim.params.G * sim.central_held_mass()),
                None => (NVec3::zeros(), NVec3::zeros(), sim.params.G * sim.params.central.m_unit),
            };
            self.write_snapshot(sim, "elliptic", |b| {
                let el = OrbitalElements::from_cartesian(&(b.x - origin), &(b.v - v_origin), mu + sim.params.G * b.m);
                [el.a, el.e, el.i, el.nu, el.omega, el.big_omega]
            })?;
        }
        self.append_column("radius.txt", sim, |b| b.radius)?;
        self.append_column("mass.txt", sim, |b| b.m)?;
        self.write_stats(sim)?;
        self.snapshots += 1;
        Ok(())
    }

    fn write_snapshot<F>(&self, sim: &Simulation, prefix: &str, coords: F) -> Result<(), SimError>
    where
        F: Fn(&Body) -> [f64; 6],
    {
        let path = self.directory.join(format!("{}_{:05}.txt", prefix, self.snapshots));
        let file = File::create(&path).map_err(io_error(&path))?;
        let mut w = BufWriter::new(file);

        for b in sim.store.iter() {
            write!(w, "{} {}", b.id.index, b.id.generation).map_err(io_error(&path))?;
            for c in coords(b) {
                write!(w, " {:.15e}", c).map_err(io_error(&path))?;
            }
            writeln!(w).map_err(io_error(&path))?;
        }
        w.flush().map_err(io_error(&path))
    }

    /// Append one line holding `value` of every live body
    fn append_column<F>(&self, name: &str, sim: &Simulation, value: F) -> Result<(), SimError>
    where
        F: Fn(&Body) -> f64,
    {
        let path = self.directory.join(name);
        let file = OpenOptions::new().append(true).open(&path).map_err(io_error(&path))?;
        let mut w = BufWriter::new(file);
        let line: Vec<String> = sim.store.iter().map(|b| format!("{:.15e}", value(b))).collect();
        writeln!(w, "{}", line.join(" ")).map_err(io_error(&path))?;
        w.flush().map_err(io_error(&path))
    }

    fn write_stats(&self, sim: &Simulation) -> Result<(), SimError> {
        let path = self.directory.join("stat.txt");
        let file = OpenOptions::new().append(true).open(&path).map_err(io_error(&path))?;
        let mut w = BufWriter::new(file);
        let s = &sim.stats;
        writeln!(
            w,
            "{:.6} {} {} {} {} {} {} {} {} {} {} {:.15e} {:.15e}",
            sim.t,
            sim.store.len(),
            s.collisions,
            s.bounces,
            s.mergers,
            s.partial_fragmentations,
            s.full_fragmentations,
            s.disruptions,
            s.fallen,
            s.escaped,
            s.spawned,
            s.absorbed_mass,
            s.lost_mass
        )
        .map_err(io_error(&path))?;
        w.flush().map_err(io_error(&path))
    }

    /// Write `init.txt` when resuming is enabled
    pub fn finish(&self, sim: &Simulation) -> Result<(), SimError> {
        if !self.resume {
            return Ok(());
        }
        let path = self.directory.join("init.txt");
        write_init_file(&path, sim.store.iter())?;
        info!("resume checkpoint written to {}", path.display());
        Ok(())
    }
}

/// Write bodies in the 8-column cartesian init format
pub fn write_init_file<'a>(path: &Path, bodies: impl Iterator<Item = &'a Body>) -> Result<(), SimError> {
    let file = File::create(path).map_err(io_error(path))?;
    let mut w = BufWriter::new(file);
    for b in bodies {
        writeln!(
            w,
            "{:.15e} {:.15e} {:.15e} {:.15e} {:.15e} {:.15e} {:.15e} {:.15e}",
            b.x.x, b.x.y, b.x.z, b.v.x, b.v.y, b.v.z, b.m, b.radius
        )
        .map_err(io_error(path))?;
    }
    w.flush().map_err(io_error(path))
}

/// Read an 8-column init file.
///
/// With `cartesian` the columns are `x y z vx vy vz m R`; otherwise
/// `a e i nu omega Omega m R`, converted about a central mass at rest at
/// `origin` with `G M = gm`.
pub fn read_init_file(path: &Path, cartesian: bool, gm: f64, G: f64, origin: NVec3) -> Result<Vec<Body>, SimError> {
    let file = File::open(path).map_err(io_error(path))?;
    let mut bodies = Vec::new();

    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_error(path))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let bad = |reason: String| SimError::InitFile {
            path: path.to_path_buf(),
            line: n + 1,
            reason,
        };
        let cols = trimmed
            .split_whitespace()
            .map(|tok| tok.parse::<f64>().map_err(|e| bad(format!("'{}': {}", tok, e))))
            .collect::<Result<Vec<f64>, SimError>>()?;
        if cols.len() != 8 {
            return Err(bad(format!("expected 8 columns, found {}", cols.len())));
        }
        let (m, radius) = (cols[6], cols[7]);
        if !(m > 0.0 && radius > 0.0) {
            return Err(bad("mass and radius must be positive".to_string()));
        }

        let (x, v) = if cartesian {
            (NVec3::new(cols[0], cols[1], cols[2]), NVec3::new(cols[3], cols[4], cols[5]))
        } else {
            let el = OrbitalElements {
                a: cols[0],
                e: cols[1],
                i: cols[2],
                nu: cols[3],
                omega: cols[4],
                big_omega: cols[5],
            };
            let (r, v) = el.to_cartesian(gm + G * m);
            (origin + r, v)
        };
        bodies.push(Body::new(x, v, m, radius));
    }
    Ok(bodies)
}
