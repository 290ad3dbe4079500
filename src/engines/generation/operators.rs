use crate::engines::generation::candidate::Candidate;
use crate::engines::generation::factory::CandidateFactory;
use crate::types::Gene;
use rand::seq::SliceRandom;
use rand::Rng;

/// Recombination schemes, one picked at random per pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossoverOperator {
    SinglePoint,
    TwoPoint,
    Uniform,
}

impl CrossoverOperator {
    pub const ALL: [CrossoverOperator; 3] = [
        CrossoverOperator::SinglePoint,
        CrossoverOperator::TwoPoint,
        CrossoverOperator::Uniform,
    ];

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        *Self::ALL.choose(rng).unwrap_or(&CrossoverOperator::Uniform)
    }
}

/// Roulette wheel selection: probability proportional to score
pub fn roulette_selection<'a, R: Rng>(population: &'a [Candidate], rng: &mut R) -> &'a Candidate {
    let total_fitness: f64 = population
        .iter()
        .map(|c| c.score().unwrap_or(0.0).max(0.0))
        .sum();

    if total_fitness <= 0.0 {
        // Nothing positive to weight by, pick random
        return &population[rng.gen_range(0..population.len())];
    }

    let mut spin = rng.gen::<f64>() * total_fitness;

    for candidate in population {
        spin -= candidate.score().unwrap_or(0.0).max(0.0);
        if spin <= 0.0 {
            return candidate;
        }
    }

    // Fallback
    &population[population.len() - 1]
}

/// Combine `parents` into one child. The first two parents drive the point
/// operators; uniform crossover draws from all of them.
pub fn crossover<R: Rng>(
    operator: CrossoverOperator,
    parents: &[&Candidate],
    mix_probability: f64,
    rng: &mut R,
) -> Candidate {
    let first = parents[0].genes();
    let second = parents.get(1).map(|p| p.genes()).unwrap_or(first);
    let len = first.len().min(second.len());

    let genes: Vec<Gene> = match operator {
        CrossoverOperator::SinglePoint if len > 1 => {
            let point = rng.gen_range(1..len);
            first[..point]
                .iter()
                .chain(&second[point..len])
                .cloned()
                .collect()
        }
        CrossoverOperator::TwoPoint if len > 2 => {
            let a = rng.gen_range(1..len - 1);
            let b = rng.gen_range(a + 1..len);
            first[..a]
                .iter()
                .chain(&second[a..b])
                .chain(&first[b..len])
                .cloned()
                .collect()
        }
        _ => (0..len)
            .map(|i| {
                if parents.len() > 1 && rng.gen::<f64>() < mix_probability {
                    let donor = parents[rng.gen_range(1..parents.len())];
                    donor.genes()[i].clone()
                } else {
                    first[i].clone()
                }
            })
            .collect(),
    };

    Candidate::new(genes)
}

/// Mutation: redraw each gene with probability `mutation_rate`
pub fn mutate<R: Rng>(
    candidate: Candidate,
    mutation_rate: f64,
    factory: &CandidateFactory,
    rng: &mut R,
) -> Candidate {
    let mut genes = candidate.genes().to_vec();
    let mut changed = false;
    for (i, gene) in genes.iter_mut().enumerate() {
        if rng.gen::<f64>() < mutation_rate {
            gene.value = factory.value_at(i, rng);
            changed = true;
        }
    }

    if changed {
        Candidate::new(genes)
    } else {
        candidate
    }
}

/// Local search around `best`: every gene is redrawn on its own `rounds` times
pub fn neighborhood<R: Rng>(
    best: &Candidate,
    rounds: usize,
    factory: &CandidateFactory,
    rng: &mut R,
) -> Vec<Candidate> {
    let mut neighbours = Vec::with_capacity(best.genes().len() * rounds);
    for i in 0..best.genes().len() {
        for _ in 0..rounds {
            neighbours.push(best.with_gene(i, factory.value_at(i, rng)));
        }
    }
    neighbours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::gene_spec::GeneSpec;
    use crate::types::{DateWindow, EvaluationResult, GeneValue};
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn scored(values: &[i64], score: f64) -> Candidate {
        let mut c = Candidate::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Gene::new(format!("g{}", i), GeneValue::Int(*v)))
                .collect(),
        );
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        c.set_evaluation(
            score,
            EvaluationResult {
                metrics: HashMap::new(),
                window: DateWindow::new(day, day),
            },
        );
        c
    }

    #[test]
    fn test_roulette_prefers_higher_scores() {
        let population = vec![scored(&[1], 1.0), scored(&[2], 99.0)];
        let mut rng = StdRng::seed_from_u64(3);
        let picks = (0..1_000)
            .filter(|_| {
                roulette_selection(&population, &mut rng).gene("g0") == Some(&GeneValue::Int(2))
            })
            .count();
        assert!(picks > 900);
    }

    #[test]
    fn test_crossover_takes_genes_from_parents() {
        let a = scored(&[1, 1, 1, 1], 1.0);
        let b = scored(&[2, 2, 2, 2], 1.0);
        let mut rng = StdRng::seed_from_u64(5);

        for operator in CrossoverOperator::ALL {
            let child = crossover(operator, &[&a, &b], 0.5, &mut rng);
            assert_eq!(child.genes().len(), 4);
            assert!(!child.is_scored());
            for gene in child.genes() {
                assert!(matches!(gene.value, GeneValue::Int(1) | GeneValue::Int(2)));
            }
        }
    }

    #[test]
    fn test_neighborhood_varies_one_gene_at_a_time() {
        let factory = CandidateFactory::new(vec![
            GeneSpec::int("g0", 0, 100),
            GeneSpec::int("g1", 0, 100),
        ])
        .unwrap();
        let best = scored(&[50, 50], 3.0);
        let mut rng = StdRng::seed_from_u64(9);

        let neighbours = neighborhood(&best, 3, &factory, &mut rng);
        assert_eq!(neighbours.len(), 6);
        for n in &neighbours {
            let differing = n
                .genes()
                .iter()
                .zip(best.genes())
                .filter(|(a, b)| a != b)
                .count();
            assert!(differing <= 1);
        }
    }
}
