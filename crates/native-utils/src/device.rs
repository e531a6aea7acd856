use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the named output device on the default host, or falls back to the
/// host's default output device when no name is given.
pub fn get_or_default_output(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("No default output device"));
    };

    let output_devices = host.output_devices()?;
    for out_device in output_devices {
        if out_device.name().is_ok_and(|name| name == target) {
            return Ok(out_device);
        }
    }
    Err(anyhow::anyhow!("No output device named {target:?}"))
}

/// Lists every output device with its channel count and sample rate, marking
/// the host default.
pub fn get_available_outputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host
        .default_output_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let mut device_names: Vec<String> = Vec::new();
    let output_devices = host.output_devices()?;
    for out_device in output_devices {
        let d_name = out_device.name()?;
        let d_cfg = out_device.default_output_config()?;
        let d_sampling_rate = d_cfg.sample_rate().0;
        let d_ch = d_cfg.channels();

        let mut d = format!(" * {}({}ch, {}hz)", d_name, d_ch, d_sampling_rate);
        if d_name == default_device {
            d.push_str(" [default]");
        }
        device_names.push(d);
    }
    Ok(device_names.join("\n"))
}
