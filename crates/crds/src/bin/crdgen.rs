//! Prints the FlexFleet CRD manifests as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/sdcfleets.yaml`

use crds::SdcFleet;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = SdcFleet::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
