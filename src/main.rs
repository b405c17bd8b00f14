use std::{fs, path::PathBuf};

use clap::{Parser, ValueEnum};
use env_logger::{Builder, Env};
use log::info;

use nrrd_volume::{Axis, ColorTable, LoadOptions, VolumeLoader};

#[derive(Clone, Copy, ValueEnum)]
enum AxisArg {
    X,
    Y,
    Z,
}

impl From<AxisArg> for Axis {
    fn from(axis: AxisArg) -> Self {
        match axis {
            AxisArg::X => Axis::X,
            AxisArg::Y => Axis::Y,
            AxisArg::Z => Axis::Z,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "nrrd-volume",
    about = "Decode an NRRD volume and export the selected slices as PNG"
)]
struct Cli {
    /// The .nrrd file to load
    input: PathBuf,

    /// Label volume with the same geometry as the input
    #[arg(short, long)]
    label_map: Option<PathBuf>,

    /// Color table for the label volume (`value name r g b a` rows)
    #[arg(short, long)]
    color_table: Option<PathBuf>,

    /// Directory the PNG files are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Only export slices along this axis
    #[arg(short, long, value_enum)]
    axis: Option<AxisArg>,

    /// Slice index along the exported axis, clamped to the volume
    #[arg(short, long, requires = "axis")]
    index: Option<usize>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut options = LoadOptions::new();
    if let Some(path) = &cli.color_table {
        let table = ColorTable::parse(&fs::read_to_string(path)?);
        info!("loaded {} color table entries from {}", table.len(), path.display());
        options = options.with_color_table(table);
    }

    let data = fs::read(&cli.input)?;
    let mut volume = match &cli.label_map {
        Some(path) => {
            let label_data = fs::read(path)?;
            tokio::task::spawn_blocking(move || {
                VolumeLoader::load_with_label_map(&data, &label_data, &options)
            })
            .await??
        }
        None => VolumeLoader::load_async(data, options).await?,
    };

    let axes: Vec<Axis> = match cli.axis {
        Some(axis) => vec![axis.into()],
        None => Axis::ALL.to_vec(),
    };
    if let (Some(index), [axis]) = (cli.index, axes.as_slice()) {
        volume.set_index(*axis, index);
    }
    volume.apply_pending_changes();

    fs::create_dir_all(&cli.output)?;
    for axis in axes {
        let Some(plane) = volume.current_slice(axis).and_then(|slice| slice.plane()) else {
            continue;
        };
        let index = volume.index(axis);
        let path = cli.output.join(format!("{axis:?}-{index}.png").to_lowercase());
        plane.texture().save(&path)?;
        info!("wrote {}x{} slice to {}", plane.width(), plane.height(), path.display());

        if let Some(label) = plane.label_map() {
            let path = cli.output.join(format!("{axis:?}-{index}-label.png").to_lowercase());
            label.save(&path)?;
            info!("wrote label overlay to {}", path.display());
        }
    }

    Ok(())
}
