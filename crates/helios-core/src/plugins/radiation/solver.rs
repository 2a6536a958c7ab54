use super::band::BandParameters;
use super::source::RadiationSource;
use crate::core::constants::STEFAN_BOLTZMANN;
use crate::core::context::{PrimitiveType, Shape, Uuid};
use crate::core::geometry::Vec3;
use crate::core::geometry::raytrace::{Bvh, Ray, cosine_weighted_direction, stratified_samples};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::HashMap;

const RAY_OFFSET: f32 = 1e-5;

/// Snapshot of one primitive taken by `update_geometry`.
#[derive(Debug, Clone)]
pub(crate) struct Surface {
    pub uuid: Uuid,
    pub shape: Shape,
    pub normal: Vec3,
    pub kind: PrimitiveType,
}

#[derive(Debug)]
pub(crate) struct Scene {
    pub bvh: Bvh,
    pub surfaces: Vec<Surface>,
    pub index: HashMap<Uuid, usize>,
}

impl Scene {
    pub fn new(bvh: Bvh, surfaces: Vec<Surface>) -> Self {
        let index = surfaces
            .iter()
            .enumerate()
            .map(|(i, s)| (s.uuid, i))
            .collect();
        Self {
            bvh,
            surfaces,
            index,
        }
    }
}

/// Optical properties of one surface in the band being solved.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Optics {
    pub reflectivity: f32,
    pub transmissivity: f32,
    pub emissivity: f32,
    pub temperature: f32,
}

impl Optics {
    fn absorptivity(&self, emission_band: bool) -> f32 {
        if emission_band {
            self.emissivity.clamp(0.0, 1.0)
        } else {
            (1.0 - self.reflectivity - self.transmissivity).clamp(0.0, 1.0)
        }
    }

    fn scattering_fraction(&self, emission_band: bool) -> f32 {
        1.0 - self.absorptivity(emission_band)
    }

    fn emitted_flux(&self) -> f32 {
        self.emissivity * STEFAN_BOLTZMANN * self.temperature.powi(4)
    }
}

/// First-bounce result for one surface.
struct Incident {
    flux: f32,
    /// Surfaces seen by the hemisphere rays, with the fraction of rays hitting each.
    view: Vec<(usize, f32)>,
}

fn trace_surface(
    scene: &Scene,
    index: usize,
    band_name: &str,
    band: &BandParameters,
    sources: &[RadiationSource],
    optics: &[Optics],
    seed: u64,
) -> Incident {
    let surface = &scene.surfaces[index];
    let mut rng = StdRng::seed_from_u64(seed ^ (u64::from(surface.uuid) << 20));
    let mut flux = 0.0f32;

    let samples = stratified_samples(band.direct_ray_count as usize, || rng.random::<f32>());
    for source in sources {
        let source_flux = source.flux(band_name);
        if source_flux <= 0.0 || samples.is_empty() {
            continue;
        }
        let mut received = 0.0f32;
        for &(s, t) in &samples {
            let point = surface.shape.sample_point(s, t);
            let (direction, max_distance) =
                source.ray_toward(&point, rng.random::<f32>(), rng.random::<f32>());
            let cosine = match surface.kind {
                PrimitiveType::Voxel => 1.0,
                _ => surface.normal.dot(&direction),
            };
            if cosine.abs() < 1e-6 {
                continue;
            }
            let origin = point + surface.normal * (RAY_OFFSET * cosine.signum());
            let ray = Ray::new(origin, direction);
            if !scene.bvh.is_occluded(&ray, max_distance, Some(surface.uuid)) {
                received += source_flux * cosine.abs();
            }
        }
        flux += received / samples.len() as f32;
    }

    let mut view: HashMap<usize, f32> = HashMap::new();
    let rays = band.diffuse_ray_count.max(1);
    let weight = 1.0 / rays as f32;
    for side in [surface.normal, -surface.normal] {
        for _ in 0..rays {
            let direction = cosine_weighted_direction(&side, rng.random(), rng.random());
            let origin = surface.shape.sample_point(rng.random(), rng.random()) + side * RAY_OFFSET;
            let ray = Ray::new(origin, direction);
            match scene.bvh.closest_hit(&ray, f32::INFINITY, Some(surface.uuid)) {
                Some(hit) => {
                    if let Some(&j) = scene.index.get(&hit.uuid) {
                        *view.entry(j).or_insert(0.0) += weight;
                        if band.emission {
                            flux += weight * optics[j].emitted_flux();
                        }
                    }
                }
                None if direction.z > 0.0 => flux += weight * band.diffuse_flux,
                None => {}
            }
        }
    }

    Incident {
        flux,
        view: view.into_iter().collect(),
    }
}

/// Absorbed flux per surface (W m⁻²) in scene order.
pub(crate) fn solve_band(
    scene: &Scene,
    band_name: &str,
    band: &BandParameters,
    sources: &[RadiationSource],
    optics: &[Optics],
    seed: u64,
) -> Vec<f32> {
    let incident: Vec<Incident> = (0..scene.surfaces.len())
        .into_par_iter()
        .map(|i| trace_surface(scene, i, band_name, band, sources, optics, seed))
        .collect();

    let mut absorbed: Vec<f32> = incident
        .iter()
        .zip(optics)
        .map(|(inc, o)| inc.flux * o.absorptivity(band.emission))
        .collect();
    let mut outgoing: Vec<f32> = incident
        .iter()
        .zip(optics)
        .map(|(inc, o)| inc.flux * o.scattering_fraction(band.emission))
        .collect();

    for _ in 0..band.scattering_depth {
        let received: Vec<f32> = incident
            .par_iter()
            .map(|inc| inc.view.iter().map(|(j, w)| w * outgoing[*j]).sum())
            .collect();
        for (i, r) in received.iter().enumerate() {
            absorbed[i] += r * optics[i].absorptivity(band.emission);
            outgoing[i] = r * optics[i].scattering_fraction(band.emission);
        }
        if received.iter().all(|r| *r < band.min_scatter_energy) {
            break;
        }
    }
    absorbed
}
