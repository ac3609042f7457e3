use std::collections::HashSet;

use spade::{DelaunayTriangulation, HasPosition, Point2, PositionInTriangulation, Triangulation};

use pcp_core::error::GeometryError;
use pcp_core::point::PointRecord;

struct GroundVertex {
    position: Point2<f64>,
    z: f64,
}

impl HasPosition for GroundVertex {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Vertex and triangle view of a built terrain model. Triangles index into
/// `vertices`; every triangle is non-collinear (degenerate faces never
/// enter the Delaunay structure).
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[usize; 3]>,
}

/// Digital terrain model: a planar Delaunay triangulation over the (x, y)
/// projection of ground points, unit-local and read-only once built.
///
/// Queries walk the triangulation from the last visited vertex (amortized
/// O(log n) per query on coherent query sequences), never scanning all
/// triangles.
pub struct Dtm {
    triangulation: DelaunayTriangulation<GroundVertex>,
}

impl Dtm {
    /// Builds the model from ground-classified points. Duplicate (x, y)
    /// positions keep the point with the lowest original index; later
    /// duplicates are discarded before triangulation.
    pub fn from_ground_points(points: &[PointRecord]) -> Result<Self, GeometryError> {
        let mut seen = HashSet::with_capacity(points.len());
        let mut vertices = Vec::with_capacity(points.len());
        for point in points {
            if seen.insert((point.x.to_bits(), point.y.to_bits())) {
                vertices.push(GroundVertex {
                    position: Point2::new(point.x, point.y),
                    z: point.z,
                });
            }
        }

        if vertices.len() < 3 {
            return Err(GeometryError::InsufficientGroundPoints {
                found: vertices.len(),
            });
        }

        let triangulation = DelaunayTriangulation::bulk_load_stable(vertices)
            .map_err(|e| GeometryError::DegenerateMesh(e.to_string()))?;

        if triangulation.num_inner_faces() == 0 {
            return Err(GeometryError::DegenerateMesh(
                "ground points are collinear".to_string(),
            ));
        }

        Ok(Self { triangulation })
    }

    /// Interpolated terrain height at (x, y), or None when the position
    /// lies outside the convex hull of the ground points.
    pub fn height_at(&self, x: f64, y: f64) -> Option<f64> {
        match self.triangulation.locate(Point2::new(x, y)) {
            PositionInTriangulation::OnVertex(handle) => {
                Some(self.triangulation.vertex(handle).data().z)
            }
            PositionInTriangulation::OnEdge(handle) => {
                let edge = self.triangulation.directed_edge(handle);
                let from = edge.from();
                let to = edge.to();
                let a = from.position();
                let b = to.position();
                // parameterize along the dominant axis of the edge
                let t = if (b.x - a.x).abs() >= (b.y - a.y).abs() {
                    (x - a.x) / (b.x - a.x)
                } else {
                    (y - a.y) / (b.y - a.y)
                };
                Some(from.data().z + (to.data().z - from.data().z) * t)
            }
            PositionInTriangulation::OnFace(handle) => {
                let face = self.triangulation.face(handle);
                let [p0, p1, p2] = face.positions();
                let [v0, v1, v2] = face.vertices();
                Some(barycentric_height(
                    x,
                    y,
                    (p0, v0.data().z),
                    (p1, v1.data().z),
                    (p2, v2.data().z),
                ))
            }
            PositionInTriangulation::OutsideOfConvexHull(_)
            | PositionInTriangulation::NoTriangulation => None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.triangulation.num_vertices()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangulation.num_inner_faces()
    }

    pub fn mesh(&self) -> TriangleMesh {
        let vertices = self
            .triangulation
            .vertices()
            .map(|v| {
                let p = v.position();
                [p.x, p.y, v.data().z]
            })
            .collect();
        let triangles = self
            .triangulation
            .inner_faces()
            .map(|face| {
                let [a, b, c] = face.vertices();
                [a.fix().index(), b.fix().index(), c.fix().index()]
            })
            .collect();
        TriangleMesh {
            vertices,
            triangles,
        }
    }
}

fn barycentric_height(
    x: f64,
    y: f64,
    (p0, z0): (Point2<f64>, f64),
    (p1, z1): (Point2<f64>, f64),
    (p2, z2): (Point2<f64>, f64),
) -> f64 {
    let denom = (p1.y - p2.y) * (p0.x - p2.x) + (p2.x - p1.x) * (p0.y - p2.y);
    let w0 = ((p1.y - p2.y) * (x - p2.x) + (p2.x - p1.x) * (y - p2.y)) / denom;
    let w1 = ((p2.y - p0.y) * (x - p2.x) + (p0.x - p2.x) * (y - p2.y)) / denom;
    let w2 = 1.0 - w0 - w1;
    w0 * z0 + w1 * z1 + w2 * z2
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcp_core::point::Classification;

    fn ground(x: f64, y: f64, z: f64) -> PointRecord {
        PointRecord::new(x, y, z, Classification::Ground)
    }

    #[test]
    fn test_insufficient_ground_points() {
        let err = Dtm::from_ground_points(&[ground(0.0, 0.0, 1.0), ground(1.0, 0.0, 1.0)])
            .err()
            .unwrap();
        assert_eq!(err, GeometryError::InsufficientGroundPoints { found: 2 });
    }

    #[test]
    fn test_collinear_points_are_degenerate() {
        let err = Dtm::from_ground_points(&[
            ground(0.0, 0.0, 1.0),
            ground(1.0, 1.0, 1.0),
            ground(2.0, 2.0, 1.0),
            ground(3.0, 3.0, 1.0),
        ])
        .err()
        .unwrap();
        assert!(matches!(err, GeometryError::DegenerateMesh(_)));
    }

    #[test]
    fn test_interpolation_inside_hull() {
        // tilted plane z = x + 2y
        let dtm = Dtm::from_ground_points(&[
            ground(0.0, 0.0, 0.0),
            ground(10.0, 0.0, 10.0),
            ground(0.0, 10.0, 20.0),
            ground(10.0, 10.0, 30.0),
        ])
        .unwrap();

        for (x, y) in [(1.0, 1.0), (5.0, 5.0), (2.5, 7.25), (9.0, 0.5)] {
            let height = dtm.height_at(x, y).unwrap();
            assert!((height - (x + 2.0 * y)).abs() < 1e-9);
        }
        // vertices and edges are exact
        assert_eq!(dtm.height_at(0.0, 0.0), Some(0.0));
        let on_edge = dtm.height_at(5.0, 0.0).unwrap();
        assert!((on_edge - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_outside_hull_is_not_covered() {
        let dtm = Dtm::from_ground_points(&[
            ground(0.0, 0.0, 0.0),
            ground(10.0, 0.0, 0.0),
            ground(0.0, 10.0, 0.0),
        ])
        .unwrap();
        assert_eq!(dtm.height_at(-1.0, -1.0), None);
        assert_eq!(dtm.height_at(10.0, 10.0), None);
        assert!(dtm.height_at(1.0, 1.0).is_some());
    }

    #[test]
    fn test_duplicate_positions_keep_lowest_index() {
        let dtm = Dtm::from_ground_points(&[
            ground(0.0, 0.0, 5.0),
            ground(0.0, 0.0, 99.0),
            ground(10.0, 0.0, 5.0),
            ground(0.0, 10.0, 5.0),
        ])
        .unwrap();
        assert_eq!(dtm.vertex_count(), 3);
        assert_eq!(dtm.height_at(0.0, 0.0), Some(5.0));
    }

    #[test]
    fn test_mesh_view() {
        let dtm = Dtm::from_ground_points(&[
            ground(0.0, 0.0, 1.0),
            ground(4.0, 0.0, 2.0),
            ground(0.0, 4.0, 3.0),
            ground(4.0, 4.0, 4.0),
        ])
        .unwrap();
        let mesh = dtm.mesh();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangles.len(), 2);
        for triangle in &mesh.triangles {
            for &index in triangle {
                assert!(index < mesh.vertices.len());
            }
        }
    }
}
