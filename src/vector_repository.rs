use anyhow::{ensure, Context, Result};

// Example manifests the service retrieves from. Encoded once at startup, in this
// order, so a search result indexes back into this array.
pub(crate) const SAMPLE_MANIFESTS: [&str; 4] = [
    r#"
    apiVersion: v2
    name: application
    description: Helm chart for a generic application
    type: application
    version: 1.0.0
    appVersion: "1.0.0"
    "#,
    r#"
  replicaCount: 1
  image:
    repository: registry.example.com/application
    pullPolicy: Always
    tag: "latest"
  service:
    type: ClusterIP
    port: 8080
    "#,
    r#"
  apiVersion: v1
  kind: Service
  metadata:
    name: application-service
  spec:
    type: ClusterIP
    ports:
      - port: 80
        targetPort: 8080
    selector:
      app: application
    "#,
    r#"
  apiVersion: apps/v1
kind: Deployment
metadata:
  name: application-deployment
spec:
  replicas: 1
  selector:
    matchLabels:
      app: application
  template:
    metadata:
      labels:
        app: application
    spec:
      containers:
      - name: application
        image: registry.example.com/application:latest
        ports:
        - containerPort: 8080
    "#,
];

// In-memory flat index: a brute-force linear scan over the stored embeddings,
// squared L2 distance.
pub(crate) struct VectorRepository {
    dimension: usize,
    embeddings: Vec<Vec<f32>>,
}

impl VectorRepository {
    pub(crate) fn new(dimension: usize) -> Self {
        return Self {
            dimension,
            embeddings: vec![],
        };
    }

    pub(crate) fn add(&mut self, embedding: Vec<f32>) -> Result<()> {
        ensure!(
            embedding.len() == self.dimension,
            "embedding has dimension {}, expected {}",
            embedding.len(),
            self.dimension
        );
        self.embeddings.push(embedding);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns the position of the stored embedding nearest to `query`.
    pub(crate) fn search(&self, query: &[f32]) -> Result<usize> {
        ensure!(
            query.len() == self.dimension,
            "query has dimension {}, expected {}",
            query.len(),
            self.dimension
        );
        let mut nearest = None;
        for (position, embedding) in self.embeddings.iter().enumerate() {
            let distance = squared_l2_distance(query, embedding);
            match nearest {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => nearest = Some((position, distance)),
            }
        }
        let (position, _distance) = nearest.context("index is empty")?;
        Ok(position)
    }
}

fn squared_l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
