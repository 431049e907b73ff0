pub mod roadmap_graph;
